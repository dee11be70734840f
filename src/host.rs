//! Host lifecycle hook
//!
//! The host can hand the poller a one-shot "ready" notification. The poller
//! then holds its first request until the host fires it; otherwise it starts
//! on its own after a short delay.

use std::time::Duration;
use tokio::sync::oneshot;

/// Fired once by the host when it has finished starting up
#[derive(Debug)]
pub struct ReadySignal {
    tx: oneshot::Sender<()>,
}

/// Held by the poller until the host is ready
#[derive(Debug)]
pub struct ReadyListener {
    rx: oneshot::Receiver<()>,
}

/// Create a connected ready signal/listener pair
pub fn ready_channel() -> (ReadySignal, ReadyListener) {
    let (tx, rx) = oneshot::channel();
    (ReadySignal { tx }, ReadyListener { rx })
}

impl ReadySignal {
    /// Notify the listener. Consumes the signal, so it can fire only once.
    pub fn notify(self) {
        let _ = self.tx.send(());
    }
}

impl ReadyListener {
    /// Wait for the notification; `false` if the host dropped the signal
    /// without firing it.
    pub async fn wait(self) -> bool {
        self.rx.await.is_ok()
    }
}

/// How the first poll cycle is triggered
#[derive(Debug)]
pub enum Startup {
    /// Poll right away
    Immediate,
    /// Poll after a fixed delay
    Delay(Duration),
    /// Poll when the host is ready; fall back to the delay if the host goes
    /// away without notifying
    WaitForReady {
        listener: ReadyListener,
        fallback_delay: Duration,
    },
}

impl Startup {
    /// Pick the startup mode from settings and an optional host listener
    pub fn choose(wait_for_ready: bool, delay: Duration, listener: Option<ReadyListener>) -> Self {
        match listener {
            Some(listener) if wait_for_ready => Startup::WaitForReady {
                listener,
                fallback_delay: delay,
            },
            _ => Startup::Delay(delay),
        }
    }
}
