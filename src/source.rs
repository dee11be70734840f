//! Price sources
//!
//! A [`PriceSource`] knows how to build the request for one upstream price API
//! and how to pull the current price out of its response body. The poller
//! picks one implementation from configuration and never branches on the API
//! itself.

use crate::config::{SourceConfig, SourceKind};
use crate::error::{PricewatchError, Result};
use chrono::{DateTime, Utc};

mod day_ahead;
mod hourly;
mod transport;

pub use day_ahead::{DayAheadSource, format_period, request_window};
pub use hourly::HourlyAverageSource;
pub use transport::{HttpTransport, ReqwestTransport, USER_AGENT};

/// Query parameters whose values never appear in logs
const SECRET_PARAMS: [&str; 1] = ["securityToken"];

/// A single outbound GET request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PriceRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl PriceRequest {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// First value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value of a header (case-insensitive name)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Full URL for logging, with secret parameters masked
    pub fn display_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let params: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| {
                if SECRET_PARAMS.contains(&k.as_str()) {
                    format!("{}=***", k)
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect();
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, sep, params.join("&"))
    }
}

/// Strategy for one upstream price API
pub trait PriceSource: Send + Sync {
    /// Which API this source talks to
    fn kind(&self) -> SourceKind;

    /// Build the request for the price valid at `now`
    fn build_request(&self, now: DateTime<Utc>) -> PriceRequest;

    /// Extract the current price from a response body
    fn extract(&self, body: &str) -> Result<f64>;
}

/// Build the configured source
pub fn from_config(config: &SourceConfig) -> Box<dyn PriceSource> {
    match config.kind {
        SourceKind::DayAhead => Box::new(DayAheadSource::new(config.day_ahead.clone())),
        SourceKind::HourlyAverage => {
            Box::new(HourlyAverageSource::new(config.hourly_average.clone()))
        }
    }
}

/// Parse a textual price leaf into a finite number
pub(crate) fn parse_price_text(raw: &str, field: &str) -> Result<f64> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PricewatchError::parse(format!(
            "{} is not a number: '{}'",
            field, trimmed
        ))),
    }
}
