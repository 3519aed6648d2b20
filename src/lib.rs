//! # Rust Tours Library
//!
//! A Rust client for the TourVisor tour-search API. Drives the provider's
//! asynchronous submit/poll/fetch search protocol, resolves human-readable
//! place names into provider numeric codes, and flattens the nested
//! hotel/tour response tree into a flat, price-ranked list of tour records.

pub mod client;
pub mod references;
pub mod results;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

// Re-export main types for convenience
pub use client::{SmartSearchResult, TourClient};
pub use references::{PlaceMatch, ReferenceEntry, ReferenceKind};
pub use results::{SearchSummary, TourRecord};

/// Default provider endpoint base.
pub const DEFAULT_BASE_URL: &str = "http://tourvisor.ru/xml";

/// Loosely-typed request parameters, keyed by provider field name.
pub type Params = Map<String, Value>;

/// Error types for the tours library
#[derive(Error, Debug)]
pub enum TourError {
    #[error("Connection to provider failed: {0}")]
    Connection(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider returned HTTP {status}")]
    HttpStatus { status: u16, body_excerpt: String },

    #[error("Provider returned a non-JSON body: {excerpt}")]
    MalformedResponse { excerpt: String },

    #[error("Provider reported an error: {message}")]
    Upstream {
        message: String,
        detail: Option<Value>,
    },

    #[error("Missing required search parameter: {0}")]
    MissingField(&'static str),

    #[error("Search was accepted but no request id was returned")]
    NoRequestId { response: Value, sent_params: Params },

    #[error("City not found: {query}")]
    CityNotFound { query: String, lookup: PlaceMatch },

    #[error("Country not found: {query}")]
    CountryNotFound { query: String, lookup: PlaceMatch },

    #[error("Search for {city} -> {country} failed: {source}")]
    SearchFailed {
        city: String,
        country: String,
        #[source]
        source: Box<TourError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TourError {
    /// Stable machine-readable tag used in serialized error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            TourError::Connection(_) => "connection_failed",
            TourError::Timeout => "timeout",
            TourError::HttpStatus { .. } => "http_error",
            TourError::MalformedResponse { .. } => "malformed_response",
            TourError::Upstream { .. } => "upstream_error",
            TourError::MissingField(_) => "missing_field",
            TourError::NoRequestId { .. } => "no_request_id",
            TourError::CityNotFound { .. } => "city_not_found",
            TourError::CountryNotFound { .. } => "country_not_found",
            TourError::SearchFailed { .. } => "search_failed",
            TourError::Config(_) => "config_error",
        }
    }

    /// Convert into the uniform envelope shape serialized back to callers.
    pub fn envelope(&self) -> ErrorEnvelope {
        let detail = match self {
            TourError::HttpStatus {
                status,
                body_excerpt,
            } => Some(json!({
                "status": status,
                "body": body_excerpt,
            })),
            TourError::Upstream { detail, .. } => detail.clone(),
            TourError::NoRequestId {
                response,
                sent_params,
            } => Some(json!({
                "response": response,
                "sent_params": sent_params,
            })),
            TourError::CityNotFound { lookup, .. } | TourError::CountryNotFound { lookup, .. } => {
                serde_json::to_value(lookup).ok()
            }
            TourError::SearchFailed {
                city,
                country,
                source,
            } => Some(json!({
                "city": city,
                "country": country,
                "error": source.envelope(),
            })),
            _ => None,
        };

        ErrorEnvelope {
            error: self.kind().to_string(),
            message: self.to_string(),
            detail,
        }
    }
}

/// Uniform failure shape returned at every API boundary.
///
/// `error` carries the machine-readable kind tag, `message` a human-readable
/// description, and `detail` whatever raw payload is useful for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// Connection settings for the tour-search provider.
///
/// Built once at process start and passed into every client constructor;
/// core logic never reads credentials from the environment on its own.
#[derive(Debug, Clone)]
pub struct TourConfig {
    pub login: String,
    pub password: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl TourConfig {
    /// Create a config with the default provider endpoint and 30s timeout.
    pub fn new(login: &str, password: &str) -> Self {
        Self {
            login: login.to_string(),
            password: password.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Read credentials from `TOURVISOR_LOGIN` / `TOURVISOR_PASSWORD`,
    /// with an optional `TOURVISOR_BASE_URL` override.
    pub fn from_env() -> Result<Self, TourError> {
        let login = std::env::var("TOURVISOR_LOGIN")
            .map_err(|_| TourError::Config("TOURVISOR_LOGIN is not set".to_string()))?;
        let password = std::env::var("TOURVISOR_PASSWORD")
            .map_err(|_| TourError::Config("TOURVISOR_PASSWORD is not set".to_string()))?;

        let mut config = Self::new(&login, &password);
        if let Ok(base_url) = std::env::var("TOURVISOR_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Pacing for the search status poll loop.
///
/// The defaults (3s before the first poll, 2s between the rest, 10 attempts,
/// 7s elapsed cutoff) are tuned to the provider's observed aggregation
/// latency and are kept as configuration rather than re-derived.
#[derive(Debug, Clone)]
pub struct PollTiming {
    pub first_delay: Duration,
    pub poll_delay: Duration,
    pub max_attempts: u32,
    pub elapsed_cutoff: i64,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_secs(3),
            poll_delay: Duration::from_secs(2),
            max_attempts: 10,
            elapsed_cutoff: 7,
        }
    }
}

/// Provider fields that are integer-typed on the wire. Values arriving as
/// strings or floats are converted; non-convertible values pass through
/// unchanged rather than failing the request.
pub const INT_PARAMS: &[&str] = &[
    "departure",
    "country",
    "adults",
    "child",
    "childage1",
    "childage2",
    "childage3",
    "nightsfrom",
    "nightsto",
    "stars",
    "rating",
    "pricefrom",
    "priceto",
    "currency",
    "hotelcode",
    "tourid",
    "city",
    "items",
    "maxdays",
];

/// Coerce integer-typed fields in a parameter mapping.
pub fn coerce_params(params: &Params) -> Params {
    let mut out = Params::new();
    for (key, value) in params {
        if INT_PARAMS.contains(&key.as_str()) {
            out.insert(key.clone(), coerce_int(value));
        } else {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

fn coerce_int(value: &Value) -> Value {
    match value {
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => value.clone(),
        },
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                value.clone()
            } else if let Some(f) = n.as_f64() {
                Value::from(f as i64)
            } else {
                value.clone()
            }
        }
        Value::Bool(b) => Value::from(*b as i64),
        _ => value.clone(),
    }
}

/// Extract the canonical parameter mapping from a wire request body.
///
/// Accepts either a bare JSON object or the `{"arguments": {...}}` envelope
/// some agent frameworks wrap tool calls in; core logic only ever sees the
/// canonical mapping.
pub fn canonical_params(body: &Value) -> Params {
    if let Some(Value::Object(args)) = body.get("arguments") {
        return args.clone();
    }
    match body {
        Value::Object(map) => map.clone(),
        _ => Params::new(),
    }
}

/// Normalize an ISO date (YYYY-MM-DD) into the provider's DD.MM.YYYY wire
/// format. Values already in wire format, or not dates at all, pass through
/// unchanged.
pub fn provider_date(value: &str) -> String {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => date.format("%d.%m.%Y").to_string(),
        Err(_) => value.to_string(),
    }
}

/// View a JSON node as a collection. The provider collapses one-element
/// lists into a bare object, so a single object counts as one element.
pub(crate) fn json_items(node: &Value) -> Vec<&Value> {
    match node {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![node],
        _ => Vec::new(),
    }
}

/// Search tours with explicit provider codes using a one-off client.
pub async fn search_tours(config: &TourConfig, params: &Params) -> Result<Value, TourError> {
    TourClient::new(config)?.search_tours(params).await
}

/// Search tours by human-readable place names using a one-off client.
pub async fn search_tours_smart(
    config: &TourConfig,
    city_name: &str,
    country_name: &str,
    extra_params: &Params,
    limit: Option<usize>,
) -> Result<SmartSearchResult, TourError> {
    TourClient::new(config)?
        .search_tours_smart(city_name, country_name, extra_params, limit)
        .await
}
