use super::{PollerSettings, PricePoller};
use crate::config::Config;
use crate::error::Result;
use crate::host::{ReadyListener, Startup};
use crate::sink::sinks_from_config;
use crate::source::{self, ReqwestTransport};
use std::sync::Arc;
use std::time::Duration;

impl PricePoller {
    /// Build a poller with the configured source, a reqwest transport and the
    /// configured sinks
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = PollerSettings::from_config(config);
        let transport =
            ReqwestTransport::new(Duration::from_secs(config.poller.request_timeout_seconds))?;

        let mut poller = PricePoller::new(
            settings,
            source::from_config(&config.source),
            Arc::new(transport),
        );
        for sink in sinks_from_config(config)? {
            poller = poller.with_sink(sink);
        }
        Ok(poller)
    }

    /// Startup mode for these settings, given the host's ready listener if any
    pub fn startup(&self, listener: Option<ReadyListener>) -> Startup {
        Startup::choose(
            self.settings.wait_for_ready,
            self.settings.startup_delay,
            listener,
        )
    }
}
