use serde::{Deserialize, Serialize};

/// A named setting in the `parameters` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: i64,
    pub name: String,
    pub value: String,
}

/// Body of `PUT /api/parameters/{name}`
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterUpdate {
    pub value: String,
}
