//! Price poll loop
//!
//! One task owns the timer, the outbound request and the publish step, so
//! cycles are strictly serialized: idle → fetching → scheduled → fetching ...
//! Every cycle ends by arming exactly one new timer, whether the fetch worked
//! or not. Other components talk to the loop through a [`PollerHandle`].

use crate::config::Config;
use crate::conversion::{UnitConversion, round_to_decimals};
use crate::error::{PricewatchError, Result};
use crate::host::Startup;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::sink::PriceSink;
use crate::source::{HttpTransport, PriceSource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;

mod builder;
mod schedule;
mod types;

#[cfg(test)]
mod tests;

pub use schedule::{Timer, sleep_until_deadline};
pub use types::{PollerCommand, PollerState, PollerStats, PriceReading};

/// Resolved, immutable poller settings
#[derive(Debug, Clone, PartialEq)]
pub struct PollerSettings {
    /// Effective refresh interval (already raised to the floor)
    pub refresh_interval: Duration,
    /// Published whenever a cycle fails
    pub fallback_value: f64,
    /// Lower bound of the expected range; values below it are only warned about
    pub min_rate: f64,
    pub conversion: UnitConversion,
    pub publish_decimals: Option<u32>,
    pub wait_for_ready: bool,
    pub startup_delay: Duration,
}

impl PollerSettings {
    /// Resolve settings from configuration, applying the interval floor
    pub fn from_config(config: &Config) -> Self {
        let poller = &config.poller;
        let kind = config.source.kind;
        let minutes = poller.effective_refresh_minutes(kind);
        if poller.refresh_was_floored(kind) {
            get_logger_with_context(LogContext::new("poller").with_source(kind.as_str())).warn(
                &format!(
                    "Polling interval of {} minutes too short, forcing {} minutes",
                    poller.refresh_interval_minutes, minutes
                ),
            );
        }
        Self {
            refresh_interval: Duration::from_secs(minutes.saturating_mul(60)),
            fallback_value: poller.max_rate,
            min_rate: poller.min_rate,
            conversion: config.conversion,
            publish_decimals: poller.publish_decimals,
            wait_for_ready: poller.startup.wait_for_ready,
            startup_delay: Duration::from_millis(poller.startup.delay_ms),
        }
    }
}

/// Cloneable access to a running poller
#[derive(Debug, Clone)]
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<PollerCommand>,
    reading: watch::Receiver<Option<PriceReading>>,
    state: watch::Receiver<PollerState>,
    stats: watch::Receiver<PollerStats>,
}

impl PollerHandle {
    /// Last published value, without triggering a fetch
    pub fn current_value(&self) -> Option<f64> {
        self.reading.borrow().as_ref().map(|r| r.value)
    }

    /// Last published reading, without triggering a fetch
    pub fn current_reading(&self) -> Option<PriceReading> {
        self.reading.borrow().clone()
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> PollerStats {
        self.stats.borrow().clone()
    }

    /// Ask the loop to poll now instead of waiting for the timer
    pub fn refresh_now(&self) -> Result<()> {
        self.send(PollerCommand::RefreshNow)
    }

    /// Ask the loop to cancel its timer and stop
    pub fn shutdown(&self) -> Result<()> {
        self.send(PollerCommand::Shutdown)
    }

    fn send(&self, cmd: PollerCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .map_err(|_| PricewatchError::generic("poller is not running"))
    }
}

/// What woke the loop up
enum Wake {
    Timer,
    Refresh,
    Shutdown,
}

/// Periodic price poller
pub struct PricePoller {
    settings: PollerSettings,
    source: Box<dyn PriceSource>,
    transport: Arc<dyn HttpTransport>,
    sinks: Vec<Arc<dyn PriceSink>>,
    timer: Timer,
    logger: StructuredLogger,
    state: watch::Sender<PollerState>,
    reading: watch::Sender<Option<PriceReading>>,
    stats: watch::Sender<PollerStats>,
    // The poller keeps a sender itself, so the channel stays open for as
    // long as the loop runs even when every handle is dropped.
    commands_tx: mpsc::UnboundedSender<PollerCommand>,
    commands_rx: mpsc::UnboundedReceiver<PollerCommand>,
}

impl PricePoller {
    /// Create a poller with no sinks attached
    pub fn new(
        settings: PollerSettings,
        source: Box<dyn PriceSource>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let logger =
            get_logger_with_context(LogContext::new("poller").with_source(source.kind().as_str()));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(PollerState::Idle);
        let (reading, _) = watch::channel(None);
        let (stats, _) = watch::channel(PollerStats::default());
        Self {
            settings,
            source,
            transport,
            sinks: Vec::new(),
            timer: Timer::new(),
            logger,
            state,
            reading,
            stats,
            commands_tx,
            commands_rx,
        }
    }

    /// Attach a publish target
    pub fn with_sink(mut self, sink: Arc<dyn PriceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> PollerStats {
        self.stats.borrow().clone()
    }

    /// Last published value, without triggering a fetch
    pub fn current_value(&self) -> Option<f64> {
        self.reading.borrow().as_ref().map(|r| r.value)
    }

    /// Handle for reading state and sending commands from other tasks
    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            commands: self.commands_tx.clone(),
            reading: self.reading.subscribe(),
            state: self.state.subscribe(),
            stats: self.stats.subscribe(),
        }
    }

    /// Cancel any pending timer and arm a new one
    pub fn schedule(&mut self, interval: Duration) {
        self.timer.arm(interval);
        let next = chrono::Duration::from_std(interval)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        self.stats.send_modify(|s| s.next_poll_at = next);
        self.state.send_replace(PollerState::Scheduled);
        self.logger.debug(&format!(
            "Next poll in {} seconds",
            interval.as_secs()
        ));
    }

    /// Request and extract the raw upstream price
    pub async fn fetch_price(&self, now: DateTime<Utc>) -> Result<f64> {
        let request = self.source.build_request(now);
        self.logger
            .info(&format!("Requesting price data: {}", request.display_url()));
        let body = self.transport.get(&request).await?;
        self.source.extract(&body)
    }

    /// Run one fetch-parse-publish cycle and reschedule
    pub async fn poll_once(&mut self) -> PriceReading {
        self.timer.cancel();
        self.state.send_replace(PollerState::Fetching);

        let now = Utc::now();
        let reading = match self.fetch_price(now).await {
            Ok(raw) => self.accept(raw, now),
            Err(e) => self.fall_back(&e, now),
        };

        self.publish(&reading).await;
        self.schedule(self.settings.refresh_interval);
        reading
    }

    fn accept(&self, raw: f64, now: DateTime<Utc>) -> PriceReading {
        let converted = self.settings.conversion.apply(raw);
        let value = round_to_decimals(converted, self.settings.publish_decimals);
        self.logger.info(&format!("Fetched price = {}", value));
        if value < self.settings.min_rate || value > self.settings.fallback_value {
            self.logger.warn(&format!(
                "Price {} is outside the configured range [{}, {}]",
                value, self.settings.min_rate, self.settings.fallback_value
            ));
        }
        self.stats.send_modify(|s| {
            s.cycles += 1;
            s.last_success_at = Some(now);
        });
        PriceReading {
            value,
            fallback: false,
            source: self.source.kind().as_str(),
            fetched_at: now,
        }
    }

    fn fall_back(&self, err: &PricewatchError, now: DateTime<Utc>) -> PriceReading {
        self.logger.error(&format!(
            "Error fetching/parsing price data ({}): {}",
            err.kind(),
            err
        ));
        self.stats.send_modify(|s| {
            s.cycles += 1;
            s.failures += 1;
            s.last_error = Some(err.to_string());
        });
        PriceReading {
            value: self.settings.fallback_value,
            fallback: true,
            source: self.source.kind().as_str(),
            fetched_at: now,
        }
    }

    async fn publish(&self, reading: &PriceReading) {
        self.reading.send_replace(Some(reading.clone()));
        for sink in &self.sinks {
            if let Err(e) = sink.publish(reading).await {
                self.logger
                    .error(&format!("Sink '{}' failed: {}", sink.name(), e));
            }
        }
    }

    /// Spawn the loop on the current runtime
    pub fn spawn(self, startup: Startup) -> JoinHandle<PollerStats> {
        tokio::spawn(self.run(startup))
    }

    /// Run the loop until a shutdown command arrives
    pub async fn run(mut self, startup: Startup) -> PollerStats {
        self.logger.info(&format!(
            "Starting price poller, refresh every {} minutes",
            self.settings.refresh_interval.as_secs() / 60
        ));

        if self.wait_for_startup(startup).await {
            loop {
                self.poll_once().await;
                let wake = match self.pending_command() {
                    Some(wake) => wake,
                    None => self.next_wake().await,
                };
                match wake {
                    Wake::Timer => {}
                    Wake::Refresh => self.logger.info("Refresh requested"),
                    Wake::Shutdown => break,
                }
            }
        }

        self.timer.cancel();
        self.state.send_replace(PollerState::Stopped);
        self.stats.send_modify(|s| s.next_poll_at = None);
        self.logger.info("Price poller stopped");
        self.stats()
    }

    /// Wait for the startup kick; false when shutdown was requested first
    async fn wait_for_startup(&mut self, startup: Startup) -> bool {
        self.state.send_replace(PollerState::Idle);
        let logger = self.logger.clone();
        let kick = async move {
            match startup {
                Startup::Immediate => {}
                Startup::Delay(delay) => tokio::time::sleep(delay).await,
                Startup::WaitForReady {
                    listener,
                    fallback_delay,
                } => {
                    if listener.wait().await {
                        logger.debug("Host ready, starting first poll");
                    } else {
                        logger.warn("Host went away before signalling ready; starting after delay");
                        tokio::time::sleep(fallback_delay).await;
                    }
                }
            }
        };

        let wake = tokio::select! {
            () = kick => Wake::Timer,
            cmd = self.commands_rx.recv() => command_wake(cmd),
        };
        // A refresh kick during startup simply starts the first poll early
        !matches!(wake, Wake::Shutdown)
    }

    /// Drain commands queued while a cycle ran. Any number of refresh kicks
    /// collapse into one extra cycle; a queued shutdown wins.
    fn pending_command(&mut self) -> Option<Wake> {
        let mut kicks = 0usize;
        while let Ok(cmd) = self.commands_rx.try_recv() {
            match cmd {
                PollerCommand::RefreshNow => kicks += 1,
                PollerCommand::Shutdown => return Some(Wake::Shutdown),
            }
        }
        if kicks > 1 {
            self.logger
                .debug(&format!("Coalesced {} queued refresh requests", kicks));
        }
        (kicks > 0).then_some(Wake::Refresh)
    }

    /// Wait for the timer or a command
    async fn next_wake(&mut self) -> Wake {
        let deadline = self.timer.deadline();
        tokio::select! {
            () = sleep_until_deadline(deadline) => Wake::Timer,
            cmd = self.commands_rx.recv() => command_wake(cmd),
        }
    }
}

fn command_wake(cmd: Option<PollerCommand>) -> Wake {
    match cmd {
        Some(PollerCommand::RefreshNow) => Wake::Refresh,
        Some(PollerCommand::Shutdown) | None => Wake::Shutdown,
    }
}
