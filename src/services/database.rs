use crate::constants::{DEFAULT_END_TIME, DEFAULT_START_TIME, PARAM_END_TIME, PARAM_START_TIME};
use crate::error::{AppError, Result};
use crate::models::{normalize_timestamp, round_value, NewSample, Parameter, Sample, SampleUpdate};
use crate::services::monitoring_hours::day_bounds_utc;
use crate::services::store::{ParameterStore, TimeSeriesStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// SQLite database holding the `time_series` and `parameters` tables
#[derive(Debug, Clone)]
pub struct SQLiteDatabaseStore {
    pool: SqlitePool,
    database_path: PathBuf,
    timezone: Tz,
}

const SAMPLE_COLUMNS: &str = "id, timestamp, indicator_type, indicator_country, indicator_value";

impl SQLiteDatabaseStore {
    /// Open (or create) the database and make sure the schema exists
    ///
    /// `timezone` defines where calendar days begin for day-based queries.
    pub async fn new(database_path: PathBuf, timezone: Tz) -> Result<Self> {
        info!("Initializing SQLite database at: {:?}", database_path);

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePool::connect_with(connect_options).await?;

        let db_store = Self { pool, database_path, timezone };
        db_store.initialize_database().await?;

        info!("SQLite database initialized successfully");
        Ok(db_store)
    }

    /// Create tables and indexes, and seed the default monitoring window
    async fn initialize_database(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS time_series (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp DATETIME NOT NULL,
                indicator_type TEXT NOT NULL,
                indicator_country TEXT NOT NULL,
                indicator_value REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS parameters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                param_name TEXT NOT NULL,
                param_value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let indexes = [
            // Latest / per-day lookups by indicator
            "CREATE INDEX IF NOT EXISTS idx_time_series_type_time ON time_series(indicator_type, timestamp DESC)",
            // Editor listing across all indicators
            "CREATE INDEX IF NOT EXISTS idx_time_series_time ON time_series(timestamp DESC)",
            // One row per parameter name
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_parameters_name ON parameters(param_name)",
        ];

        for index in indexes {
            sqlx::query(index).execute(&self.pool).await?;
        }

        for (name, value) in [(PARAM_START_TIME, DEFAULT_START_TIME), (PARAM_END_TIME, DEFAULT_END_TIME)] {
            sqlx::query("INSERT OR IGNORE INTO parameters (param_name, param_value) VALUES (?1, ?2)")
                .bind(name)
                .bind(value)
                .execute(&self.pool)
                .await?;
        }

        info!("Database schema initialized successfully");
        Ok(())
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Per-indicator row counts and time ranges
    pub async fn indicator_stats(&self) -> Result<Vec<IndicatorStats>> {
        let rows = sqlx::query(
            r#"
            SELECT indicator_type, indicator_country, COUNT(*) AS records,
                   MIN(timestamp) AS first_seen, MAX(timestamp) AS last_seen
            FROM time_series
            GROUP BY indicator_type, indicator_country
            ORDER BY indicator_type, indicator_country
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(IndicatorStats {
                    indicator_type: row.try_get("indicator_type")?,
                    indicator_country: row.try_get("indicator_country")?,
                    records: row.try_get("records")?,
                    first_seen: row.try_get("first_seen")?,
                    last_seen: row.try_get("last_seen")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(AppError::from)
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite database connection pool closed");
    }

    async fn sample_in_range(
        &self,
        indicator_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        newest: bool,
    ) -> Result<Option<Sample>> {
        let order = if newest { "DESC" } else { "ASC" };
        let query = format!(
            "SELECT {} FROM time_series \
             WHERE indicator_type = ?1 AND timestamp >= ?2 AND timestamp < ?3 \
             ORDER BY timestamp {}, id {} LIMIT 1",
            SAMPLE_COLUMNS, order, order
        );

        let row = sqlx::query(&query)
            .bind(indicator_type)
            .bind(start)
            .bind(end)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_sample).transpose()
    }
}

#[async_trait]
impl TimeSeriesStore for SQLiteDatabaseStore {
    async fn insert(&self, sample: NewSample) -> Result<Sample> {
        sample.validate().map_err(AppError::InvalidInput)?;

        let timestamp = normalize_timestamp(sample.timestamp.unwrap_or_else(Utc::now));
        let value = round_value(sample.value);

        let result = sqlx::query(
            "INSERT INTO time_series (timestamp, indicator_type, indicator_country, indicator_value) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(timestamp)
        .bind(&sample.indicator_type)
        .bind(&sample.indicator_country)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!(
            indicator = %sample.indicator_type,
            value,
            "Stored sample"
        );

        Ok(Sample {
            id: result.last_insert_rowid(),
            timestamp,
            indicator_type: sample.indicator_type,
            indicator_country: sample.indicator_country,
            value,
        })
    }

    async fn latest(&self, indicator_type: &str) -> Result<Option<Sample>> {
        let query = format!(
            "SELECT {} FROM time_series WHERE indicator_type = ?1 ORDER BY timestamp DESC, id DESC LIMIT 1",
            SAMPLE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(indicator_type)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_sample).transpose()
    }

    async fn last_on_day(&self, indicator_type: &str, day: NaiveDate) -> Result<Option<Sample>> {
        let (start, end) = day_bounds_utc(day, self.timezone);
        self.sample_in_range(indicator_type, start, end, true).await
    }

    async fn first_on_day(&self, indicator_type: &str, day: NaiveDate) -> Result<Option<Sample>> {
        let (start, end) = day_bounds_utc(day, self.timezone);
        self.sample_in_range(indicator_type, start, end, false).await
    }

    async fn recent(&self, indicator_type: Option<&str>, limit: i64) -> Result<Vec<Sample>> {
        let rows = match indicator_type {
            Some(indicator_type) => {
                let query = format!(
                    "SELECT {} FROM time_series WHERE indicator_type = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
                    SAMPLE_COLUMNS
                );
                sqlx::query(&query)
                    .bind(indicator_type)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {} FROM time_series ORDER BY timestamp DESC, id DESC LIMIT ?1",
                    SAMPLE_COLUMNS
                );
                sqlx::query(&query).bind(limit).fetch_all(&self.pool).await?
            }
        };

        rows.into_iter().map(row_to_sample).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Sample>> {
        let query = format!("SELECT {} FROM time_series WHERE id = ?1", SAMPLE_COLUMNS);
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        row.map(row_to_sample).transpose()
    }

    async fn update(&self, id: i64, update: SampleUpdate) -> Result<Option<Sample>> {
        let mut transaction = self.pool.begin().await?;

        let query = format!("SELECT {} FROM time_series WHERE id = ?1", SAMPLE_COLUMNS);
        let row = sqlx::query(&query).bind(id).fetch_optional(&mut *transaction).await?;
        let mut sample = match row {
            Some(row) => row_to_sample(row)?,
            None => return Ok(None),
        };

        update.apply(&mut sample);
        NewSample::new(&sample.indicator_type, &sample.indicator_country, sample.value)
            .validate()
            .map_err(AppError::InvalidInput)?;

        sqlx::query(
            r#"
            UPDATE time_series
            SET timestamp = ?1, indicator_type = ?2, indicator_country = ?3, indicator_value = ?4
            WHERE id = ?5
            "#,
        )
        .bind(sample.timestamp)
        .bind(&sample.indicator_type)
        .bind(&sample.indicator_country)
        .bind(sample.value)
        .bind(id)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;
        Ok(Some(sample))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM time_series WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ParameterStore for SQLiteDatabaseStore {
    async fn get_parameters(&self, names: &HashSet<&str>) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT param_name, param_value FROM parameters")
            .fetch_all(&self.pool)
            .await?;

        let mut params = HashMap::new();
        for row in rows {
            let name: String = row.try_get("param_name")?;
            if names.contains(name.as_str()) {
                params.insert(name, row.try_get("param_value")?);
            }
        }
        Ok(params)
    }

    async fn all_parameters(&self) -> Result<Vec<Parameter>> {
        let rows = sqlx::query("SELECT id, param_name, param_value FROM parameters ORDER BY param_name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_parameter).collect()
    }

    async fn set_parameter(&self, name: &str, value: &str) -> Result<Parameter> {
        sqlx::query(
            r#"
            INSERT INTO parameters (param_name, param_value) VALUES (?1, ?2)
            ON CONFLICT(param_name) DO UPDATE SET param_value = excluded.param_value
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id, param_name, param_value FROM parameters WHERE param_name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        info!(parameter = name, value, "Parameter updated");
        row_to_parameter(row)
    }
}

fn row_to_sample(row: sqlx::sqlite::SqliteRow) -> Result<Sample> {
    Ok(Sample {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        indicator_type: row.try_get("indicator_type")?,
        indicator_country: row.try_get("indicator_country")?,
        value: row.try_get("indicator_value")?,
    })
}

fn row_to_parameter(row: sqlx::sqlite::SqliteRow) -> Result<Parameter> {
    Ok(Parameter {
        id: row.try_get("id")?,
        name: row.try_get("param_name")?,
        value: row.try_get("param_value")?,
    })
}

/// Row counts and time range for one indicator
#[derive(Debug, Clone)]
pub struct IndicatorStats {
    pub indicator_type: String,
    pub indicator_country: String,
    pub records: i64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn open(dir: &tempfile::TempDir, tz: Tz) -> SQLiteDatabaseStore {
        SQLiteDatabaseStore::new(dir.path().join("test.db"), tz).await.unwrap()
    }

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_database_creation_seeds_window() {
        let temp_dir = tempdir().unwrap();
        let db = open(&temp_dir, Tz::UTC).await;
        assert!(db.database_path().exists());

        let names: HashSet<&str> = ["start_time", "end_time", "daily_email_time"].into_iter().collect();
        let params = db.get_parameters(&names).await.unwrap();
        assert_eq!(params.get("start_time").map(String::as_str), Some("08:00"));
        assert_eq!(params.get("end_time").map(String::as_str), Some("17:00"));
        assert!(!params.contains_key("daily_email_time"));

        db.close().await;
    }

    #[tokio::test]
    async fn test_reopen_keeps_existing_parameters() {
        let temp_dir = tempdir().unwrap();
        {
            let db = open(&temp_dir, Tz::UTC).await;
            db.set_parameter("start_time", "06:30").await.unwrap();
            db.close().await;
        }

        let db = open(&temp_dir, Tz::UTC).await;
        let names: HashSet<&str> = ["start_time"].into_iter().collect();
        let params = db.get_parameters(&names).await.unwrap();
        assert_eq!(params.get("start_time").map(String::as_str), Some("06:30"));
        assert_eq!(db.all_parameters().await.unwrap().len(), 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_insert_and_latest() {
        let temp_dir = tempdir().unwrap();
        let db = open(&temp_dir, Tz::UTC).await;

        assert!(db.latest("gold").await.unwrap().is_none());

        db.insert(NewSample::new("gold", "USA", 2000.0).at(ts(1, 9, 0))).await.unwrap();
        db.insert(NewSample::new("gold", "USA", 2010.456).at(ts(1, 10, 0))).await.unwrap();
        db.insert(NewSample::new("bitcoin", "USA", 65000.0).at(ts(1, 11, 0))).await.unwrap();

        let latest = db.latest("gold").await.unwrap().unwrap();
        assert_eq!(latest.value, 2010.46);
        assert_eq!(latest.timestamp, ts(1, 10, 0));
        assert_eq!(latest.indicator_country, "USA");

        db.close().await;
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_sample() {
        let temp_dir = tempdir().unwrap();
        let db = open(&temp_dir, Tz::UTC).await;

        let result = db.insert(NewSample::new("gold", "USA", f64::INFINITY)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        db.close().await;
    }

    #[tokio::test]
    async fn test_first_and_last_on_day() {
        let temp_dir = tempdir().unwrap();
        let db = open(&temp_dir, Tz::UTC).await;

        db.insert(NewSample::new("gold", "USA", 1990.0).at(ts(1, 23, 59))).await.unwrap();
        db.insert(NewSample::new("gold", "USA", 2000.0).at(ts(2, 0, 0))).await.unwrap();
        db.insert(NewSample::new("gold", "USA", 2005.0).at(ts(2, 12, 0))).await.unwrap();
        db.insert(NewSample::new("gold", "USA", 2010.0).at(ts(2, 23, 0))).await.unwrap();
        db.insert(NewSample::new("gold", "USA", 2020.0).at(ts(3, 0, 0))).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(db.first_on_day("gold", day).await.unwrap().unwrap().value, 2000.0);
        assert_eq!(db.last_on_day("gold", day).await.unwrap().unwrap().value, 2010.0);

        let empty_day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(db.last_on_day("gold", empty_day).await.unwrap().is_none());
        assert!(db.first_on_day("bitcoin", day).await.unwrap().is_none());

        db.close().await;
    }

    #[tokio::test]
    async fn test_day_bounds_follow_timezone() {
        let temp_dir = tempdir().unwrap();
        let db = open(&temp_dir, chrono_tz::Europe::London).await;

        // 23:30 UTC on 1 July is 00:30 BST on 2 July
        let late = Utc.with_ymd_and_hms(2024, 7, 1, 23, 30, 0).unwrap();
        db.insert(NewSample::new("gold", "USA", 2300.0).at(late)).await.unwrap();

        let july_1 = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let july_2 = NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();
        assert!(db.last_on_day("gold", july_1).await.unwrap().is_none());
        assert_eq!(db.last_on_day("gold", july_2).await.unwrap().unwrap().value, 2300.0);

        db.close().await;
    }

    #[tokio::test]
    async fn test_editor_operations() {
        let temp_dir = tempdir().unwrap();
        let db = open(&temp_dir, Tz::UTC).await;

        let stored = db.insert(NewSample::new("gold", "USA", 2000.0).at(ts(1, 9, 0))).await.unwrap();
        db.insert(NewSample::new("bitcoin", "USA", 65000.0).at(ts(1, 10, 0))).await.unwrap();

        let all = db.recent(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].indicator_type, "bitcoin");

        let gold_only = db.recent(Some("gold"), 10).await.unwrap();
        assert_eq!(gold_only.len(), 1);

        let update = SampleUpdate {
            value: Some(2001.5),
            ..SampleUpdate::default()
        };
        let updated = db.update(stored.id, update).await.unwrap().unwrap();
        assert_eq!(updated.value, 2001.5);
        assert_eq!(db.get(stored.id).await.unwrap().unwrap().value, 2001.5);

        assert!(db.update(9999, SampleUpdate::default()).await.unwrap().is_none());

        assert!(db.delete(stored.id).await.unwrap());
        assert!(!db.delete(stored.id).await.unwrap());
        assert!(db.get(stored.id).await.unwrap().is_none());

        db.close().await;
    }

    #[tokio::test]
    async fn test_indicator_stats() {
        let temp_dir = tempdir().unwrap();
        let db = open(&temp_dir, Tz::UTC).await;

        db.insert(NewSample::new("gold", "USA", 2000.0).at(ts(1, 9, 0))).await.unwrap();
        db.insert(NewSample::new("gold", "USA", 2001.0).at(ts(2, 9, 0))).await.unwrap();

        let stats = db.indicator_stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].records, 2);
        assert_eq!(stats[0].first_seen, Some(ts(1, 9, 0)));
        assert_eq!(stats[0].last_seen, Some(ts(2, 9, 0)));

        db.close().await;
    }
}
