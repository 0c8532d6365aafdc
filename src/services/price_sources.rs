use crate::error::{AppError, Error};
use crate::models::PerplexityConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const SWISSQUOTE_BASE_URL: &str = "https://forex-data-feed.swissquote.com/public-quotes/bboquotes/instrument";
const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// Keys the bond prompt is expected to answer with, and where each one is stored
const BOND_KEYS: &[(&str, &str, &str)] = &[
    ("gilt_2yr", "gilt_2y", "UK"),
    ("gilt_10yr", "gilt_10y", "UK"),
    ("gilt_30yr", "gilt_30y", "UK"),
    ("us_10yr", "treasury_10y", "USA"),
];

/// A freshly fetched value, ready to be stored as a sample
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub indicator_type: String,
    pub indicator_country: String,
    pub value: f64,
}

impl Quote {
    pub fn new(indicator_type: &str, indicator_country: &str, value: f64) -> Self {
        Self {
            indicator_type: indicator_type.to_string(),
            indicator_country: indicator_country.to_string(),
            value,
        }
    }
}

/// External source of current prices
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<Quote>, Error>;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Bid price of a Swissquote instrument, e.g. XAU/USD for gold
pub struct SwissquoteSource {
    name: String,
    url: String,
    indicator_type: String,
    indicator_country: String,
    client: reqwest::Client,
}

impl SwissquoteSource {
    pub fn new(instrument: &str, indicator_type: &str, indicator_country: &str, timeout: Duration) -> Result<Self, Error> {
        Self::with_base_url(SWISSQUOTE_BASE_URL, instrument, indicator_type, indicator_country, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        instrument: &str,
        indicator_type: &str,
        indicator_country: &str,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let base_url = base_url.trim().trim_end_matches('/');
        let instrument = instrument.trim().trim_matches('/');
        if !instrument.contains('/') {
            return Err(Error::Config(format!(
                "Invalid Swissquote instrument '{}': expected BASE/QUOTE",
                instrument
            )));
        }

        Ok(Self {
            name: format!("swissquote:{}", instrument),
            url: format!("{}/{}", base_url, instrument),
            indicator_type: indicator_type.to_string(),
            indicator_country: indicator_country.to_string(),
            client: build_client(timeout)?,
        })
    }

    /// Gold (XAU/USD) and bitcoin (BTC/USD)
    pub fn defaults(timeout: Duration) -> Result<Vec<Self>, Error> {
        Ok(vec![
            Self::new("XAU/USD", "gold", "USA", timeout)?,
            Self::new("BTC/USD", "bitcoin", "USA", timeout)?,
        ])
    }
}

#[async_trait]
impl PriceSource for SwissquoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<Quote>, Error> {
        debug!(url = %self.url, "Fetching Swissquote quote");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Swissquote request failed: {} (url: {})", e, self.url)))?;

        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "Swissquote returned error status {} for {}",
                response.status(),
                self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {}", e)))?;

        let bid = parse_swissquote_bid(&body)?;
        info!(source = %self.name, indicator = %self.indicator_type, bid, "Parsed Swissquote price");

        Ok(vec![Quote::new(&self.indicator_type, &self.indicator_country, bid)])
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwissquoteQuote {
    #[serde(default)]
    spread_profile_prices: Vec<SpreadProfilePrice>,
}

#[derive(Debug, Deserialize)]
struct SpreadProfilePrice {
    bid: Option<f64>,
}

/// Bid of the first spread profile of the first quote
pub fn parse_swissquote_bid(body: &str) -> Result<f64, Error> {
    let quotes: Vec<SwissquoteQuote> = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("Failed to parse Swissquote response: {}", e)))?;

    let bid = quotes
        .first()
        .and_then(|q| q.spread_profile_prices.first())
        .and_then(|p| p.bid)
        .ok_or_else(|| Error::Parse("Swissquote response has no bid price".to_string()))?;

    if !bid.is_finite() || bid <= 0.0 {
        return Err(Error::Parse(format!("Swissquote bid is not a valid price: {}", bid)));
    }
    Ok(bid)
}

/// Bond yields answered by the Perplexity chat-completions API
pub struct PerplexitySource {
    name: String,
    config: PerplexityConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl PerplexitySource {
    pub fn new(config: PerplexityConfig, timeout: Duration) -> Result<Self, Error> {
        Self::with_base_url(PERPLEXITY_BASE_URL, config, timeout)
    }

    pub fn with_base_url(base_url: &str, config: PerplexityConfig, timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            name: format!("perplexity:{}", config.label),
            endpoint: format!("{}/chat/completions", base_url.trim().trim_end_matches('/')),
            config,
            client: build_client(timeout)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl PriceSource for PerplexitySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<Quote>, Error> {
        let request = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": self.config.prompt }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Perplexity request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(Error::Network(format!("Perplexity returned error status {}: {}", status, body)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("Failed to parse Perplexity response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Parse("Perplexity response has no choices".to_string()))?;

        debug!(content = %content, "Raw bond yield answer");
        parse_bond_yields(&content)
    }
}

/// Pull the JSON object out of a model answer
///
/// Answers often wrap the object in a ```json fence or surround it with prose.
pub fn extract_json_object(content: &str) -> &str {
    if let Some(fence_start) = content.find("```") {
        let after_fence = &content[fence_start + 3..];
        let after_tag = after_fence.strip_prefix("json").unwrap_or(after_fence).trim_start();
        if after_tag.starts_with('{') {
            if let Some(fence_end) = after_tag.find("```") {
                let candidate = after_tag[..fence_end].trim_end();
                if candidate.ends_with('}') {
                    return candidate;
                }
            }
        }
    }

    let trimmed = content.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Map a bond-yield answer onto quotes; unknown and absent keys are ignored
///
/// A prompt may cover only some of the yields, so an absent key is not an error.
pub fn parse_bond_yields(content: &str) -> Result<Vec<Quote>, Error> {
    let json = extract_json_object(content);
    let object: serde_json::Map<String, Value> = serde_json::from_str(json)
        .map_err(|e| AppError::Parse(format!("Bond yield answer is not a JSON object: {} (content: {})", e, json)))?;

    let mut quotes = Vec::new();
    for (key, indicator_type, country) in BOND_KEYS {
        let Some(raw) = object.get(*key) else {
            debug!(key = *key, "Bond yield not in answer");
            continue;
        };
        let value = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
            _ => None,
        };

        match value {
            Some(v) if v.is_finite() => quotes.push(Quote::new(indicator_type, country, v)),
            _ => warn!(key = *key, value = %raw, "Invalid bond yield in answer"),
        }
    }

    Ok(quotes)
}
