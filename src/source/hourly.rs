//! Hourly average price source (JSON)
//!
//! The endpoint always returns the latest value, so requests carry no time
//! window. The body is a list of records, either bare or wrapped in a
//! `records` field, and the first record's `price` is used.

use super::{PriceRequest, PriceSource, parse_price_text};
use crate::config::{HourlyAverageConfig, SourceKind};
use crate::error::{PricewatchError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Real-time hourly average JSON API
#[derive(Debug, Clone)]
pub struct HourlyAverageSource {
    config: HourlyAverageConfig,
}

impl HourlyAverageSource {
    pub fn new(config: HourlyAverageConfig) -> Self {
        Self { config }
    }
}

impl PriceSource for HourlyAverageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::HourlyAverage
    }

    fn build_request(&self, _now: DateTime<Utc>) -> PriceRequest {
        PriceRequest::new(self.config.base_url.trim())
            .with_query("type", self.config.query_type.trim())
    }

    fn extract(&self, body: &str) -> Result<f64> {
        let root: Value = serde_json::from_str(body)?;

        let records = match &root {
            Value::Array(items) => items,
            Value::Object(obj) => obj
                .get("records")
                .and_then(|v| v.as_array())
                .ok_or_else(|| PricewatchError::parse("response has no records array"))?,
            _ => return Err(PricewatchError::parse("response is not a list of records")),
        };

        let first = records
            .first()
            .ok_or_else(|| PricewatchError::parse("records list is empty"))?;

        match first.get("price") {
            None | Some(Value::Null) => Err(PricewatchError::parse("records[0].price is missing")),
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| PricewatchError::parse("records[0].price is out of range")),
            // The upstream API quotes its numbers
            Some(Value::String(s)) => parse_price_text(s, "records[0].price"),
            Some(other) => Err(PricewatchError::parse(format!(
                "records[0].price has unexpected type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> HourlyAverageSource {
        HourlyAverageSource::new(HourlyAverageConfig::default())
    }

    #[test]
    fn request_has_type_only() {
        let req = source().build_request(Utc::now());
        assert_eq!(req.query, vec![("type".to_string(), "currenthouraverage".to_string())]);
        assert!(req.headers.is_empty());
    }

    #[test]
    fn wrapped_number() {
        let v = source().extract(r#"{"records":[{"price": 4.9}]}"#).unwrap();
        assert_eq!(v, 4.9);
    }

    #[test]
    fn bare_array_with_quoted_price() {
        let v = source()
            .extract(r#"[{"millisUTC":"1700000000000","price":"3.1"},{"price":"9.9"}]"#)
            .unwrap();
        assert_eq!(v, 3.1);
    }

    #[test]
    fn null_price_is_an_error() {
        assert!(source().extract(r#"{"records":[{"price": null}]}"#).is_err());
        assert!(source().extract(r#"{"records":[{"millisUTC":"1"}]}"#).is_err());
    }

    #[test]
    fn empty_and_malformed_bodies_are_errors() {
        assert!(source().extract(r#"{"records":[]}"#).is_err());
        assert!(source().extract("[]").is_err());
        assert!(source().extract(r#"{"data":1}"#).is_err());
        assert!(source().extract("<html>").is_err());
        assert!(source().extract(r#"{"records":[{"price": true}]}"#).is_err());
    }
}
