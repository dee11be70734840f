//! Day-ahead market price source (XML)
//!
//! Requests the one-hour window starting at the current UTC hour and reads the
//! first point of the first period of the first time series.

use super::{PriceRequest, PriceSource, parse_price_text};
use crate::config::{ApiKeyLocation, DayAheadConfig, SourceKind};
use crate::error::{PricewatchError, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Deserialize;

/// `YYYYMMDDHHmm` in UTC
const PERIOD_FORMAT: &str = "%Y%m%d%H%M";

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const API_KEY_QUERY: &str = "securityToken";

// Only the path down to the price leaf is modeled; every level may occur once
// or many times in the document.
#[derive(Debug, Default, Deserialize)]
struct MarketDocument {
    #[serde(rename = "TimeSeries", default)]
    time_series: Vec<TimeSeries>,
    #[serde(rename = "Reason", default)]
    reasons: Vec<Reason>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeSeries {
    #[serde(rename = "Period", default)]
    periods: Vec<Period>,
}

#[derive(Debug, Default, Deserialize)]
struct Period {
    #[serde(rename = "Point", default)]
    points: Vec<Point>,
}

#[derive(Debug, Default, Deserialize)]
struct Point {
    #[serde(rename = "price.amount", default)]
    price_amount: Option<String>,
}

// Acknowledgement documents explain why no data was returned
#[derive(Debug, Default, Deserialize)]
struct Reason {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Start and end of the request window: the current UTC hour
pub fn request_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    (start, start + Duration::hours(1))
}

/// Format a timestamp the way the day-ahead API expects
pub fn format_period(at: DateTime<Utc>) -> String {
    at.format(PERIOD_FORMAT).to_string()
}

/// Day-ahead market XML API
#[derive(Debug, Clone)]
pub struct DayAheadSource {
    config: DayAheadConfig,
}

impl DayAheadSource {
    pub fn new(config: DayAheadConfig) -> Self {
        Self { config }
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl PriceSource for DayAheadSource {
    fn kind(&self) -> SourceKind {
        SourceKind::DayAhead
    }

    fn build_request(&self, now: DateTime<Utc>) -> PriceRequest {
        let (start, end) = request_window(now);
        let mut request = PriceRequest::new(self.config.base_url.trim())
            .with_query("documentType", self.config.document_type.trim())
            .with_query("in_Domain", self.config.in_domain.trim())
            .with_query("out_Domain", self.config.out_domain.trim())
            .with_query("periodStart", format_period(start))
            .with_query("periodEnd", format_period(end));

        if let Some(key) = self.api_key() {
            request = match self.config.api_key_location {
                ApiKeyLocation::Header => request.with_header(API_KEY_HEADER, key),
                ApiKeyLocation::Query => request.with_query(API_KEY_QUERY, key),
            };
        }
        request
    }

    fn extract(&self, body: &str) -> Result<f64> {
        let doc: MarketDocument = quick_xml::de::from_str(body)?;

        let Some(series) = doc.time_series.first() else {
            return Err(missing_series(&doc.reasons));
        };
        let period = series
            .periods
            .first()
            .ok_or_else(|| PricewatchError::parse("TimeSeries has no Period"))?;
        let point = period
            .points
            .first()
            .ok_or_else(|| PricewatchError::parse("Period has no Point"))?;
        let raw = point
            .price_amount
            .as_deref()
            .ok_or_else(|| PricewatchError::parse("Point has no price.amount"))?;

        parse_price_text(raw, "price.amount")
    }
}

fn missing_series(reasons: &[Reason]) -> PricewatchError {
    let detail: Vec<String> = reasons
        .iter()
        .map(|r| match (&r.code, &r.text) {
            (Some(code), Some(text)) => format!("{} ({})", text.trim(), code.trim()),
            (None, Some(text)) => text.trim().to_string(),
            (Some(code), None) => format!("code {}", code.trim()),
            (None, None) => "unspecified".to_string(),
        })
        .collect();
    if detail.is_empty() {
        PricewatchError::parse("document has no TimeSeries")
    } else {
        PricewatchError::parse(format!(
            "document has no TimeSeries: {}",
            detail.join("; ")
        ))
    }
}
