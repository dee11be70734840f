//! HTTP transport used by the poller
//!
//! The poller owns an injected transport instance; production code uses
//! [`ReqwestTransport`], tests substitute their own implementation.

use super::PriceRequest;
use crate::error::{PricewatchError, Result};
use crate::logging::{StructuredLogger, get_logger};
use std::time::Duration;

pub const USER_AGENT: &str = concat!("pricewatch/", env!("CARGO_PKG_VERSION"));

/// Longest response excerpt carried in an error message
const ERROR_BODY_EXCERPT: usize = 200;

/// Performs one GET and returns the body of a successful response
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &PriceRequest) -> Result<String>;
}

/// `reqwest`-backed transport with a fixed request timeout
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    logger: StructuredLogger,
}

impl ReqwestTransport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Wrap an already configured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            logger: get_logger("transport"),
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &PriceRequest) -> Result<String> {
        let mut builder = self.client.get(request.url.as_str()).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            self.logger
                .debug(&format!("Price API returned {} for {}", status, request.url));
            return Err(PricewatchError::api(format!(
                "HTTP {}: {}",
                status,
                excerpt(&body)
            )));
        }

        Ok(resp.text().await?)
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_EXCERPT {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(ERROR_BODY_EXCERPT).collect();
    format!("{}...", cut)
}
