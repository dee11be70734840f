//! Publish targets for price readings
//!
//! The poller hands every reading to each configured sink in turn. A sink
//! failure is logged by the poller and never retried.

use crate::config::{Config, WebhookConfig};
use crate::conversion::format_display;
use crate::error::{PricewatchError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::poller::PriceReading;
use std::sync::Arc;
use std::time::Duration;

/// Receives every published reading
#[async_trait::async_trait]
pub trait PriceSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn publish(&self, reading: &PriceReading) -> Result<()>;
}

/// Writes one structured log line per reading
#[derive(Debug, Clone)]
pub struct LogSink {
    logger: StructuredLogger,
}

impl LogSink {
    pub fn new(accessory_name: &str) -> Self {
        let context = LogContext::new("sink").with_field("accessory", accessory_name.to_string());
        Self {
            logger: get_logger_with_context(context),
        }
    }
}

#[async_trait::async_trait]
impl PriceSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, reading: &PriceReading) -> Result<()> {
        let kind = if reading.fallback { "fallback" } else { "price" };
        self.logger.info(&format!(
            "Published {} {} from {}",
            kind,
            format_display(reading.value),
            reading.source
        ));
        Ok(())
    }
}

/// POSTs each reading as JSON to a URL
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
    accessory_name: String,
}

impl WebhookSink {
    pub fn new(config: &WebhookConfig, accessory_name: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(crate::source::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim().to_string(),
            bearer_token: config
                .bearer_token
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            accessory_name: accessory_name.to_string(),
        })
    }

    /// JSON body sent for a reading
    pub fn payload(&self, reading: &PriceReading) -> serde_json::Value {
        serde_json::json!({
            "name": self.accessory_name,
            "value": reading.value,
            "display": format_display(reading.value),
            "fallback": reading.fallback,
            "source": reading.source,
            "fetched_at": reading.fetched_at.to_rfc3339(),
        })
    }
}

#[async_trait::async_trait]
impl PriceSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(&self, reading: &PriceReading) -> Result<()> {
        let mut req = self.client.post(self.url.as_str()).json(&self.payload(reading));
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(PricewatchError::api(format!(
                "webhook returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Build the sinks named in the configuration
pub fn sinks_from_config(config: &Config) -> Result<Vec<Arc<dyn PriceSink>>> {
    let mut sinks: Vec<Arc<dyn PriceSink>> = Vec::new();
    if config.sinks.log {
        sinks.push(Arc::new(LogSink::new(&config.accessory.name)));
    }
    if let Some(webhook) = &config.sinks.webhook {
        sinks.push(Arc::new(WebhookSink::new(webhook, &config.accessory.name)?));
    }
    Ok(sinks)
}
