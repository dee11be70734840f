//! # Pricewatch - electricity price poller
//!
//! Periodically fetches the current electricity price from a day-ahead
//! market API or a real-time hourly average API and republishes it as a
//! single numeric reading. Smart-home hosts expose that reading as a
//! "temperature" so the price can drive ordinary automations.
//!
//! ## Features
//!
//! - **Two price sources**: day-ahead market XML and hourly average JSON
//! - **Fallback on error**: any failed cycle publishes the configured maximum rate
//! - **Interval floor**: refresh intervals below the source minimum are raised
//! - **Unit conversion**: optional explicit transform before publishing
//! - **Sinks**: structured log line and optional JSON webhook
//! - **Web Interface**: REST status API with manual refresh
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `source`: Request building and response extraction per price API
//! - `poller`: The serialized fetch, publish and reschedule loop
//! - `sink`: Publish targets for readings
//! - `host`: Ready notification from the hosting process
//! - `conversion`: Unit conversion and rounding
//! - `web`: HTTP server and REST API

pub mod config;
pub mod conversion;
pub mod error;
pub mod host;
pub mod logging;
pub mod poller;
pub mod sink;
pub mod source;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{PricewatchError, Result};
pub use poller::{PollerHandle, PricePoller, PriceReading};

/// Version string including the nightly suffix when built as such
pub const APP_VERSION: &str = env!("APP_VERSION");
