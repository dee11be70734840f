use super::*;
use crate::config::{DayAheadConfig, HourlyAverageConfig};
use crate::host::ready_channel;
use crate::source::{DayAheadSource, HourlyAverageSource, PriceRequest};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const DAY_AHEAD_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Publication_MarketDocument>
  <mRID>1</mRID>
  <TimeSeries>
    <Period>
      <resolution>PT60M</resolution>
      <Point><position>1</position><price.amount>52.31</price.amount></Point>
      <Point><position>2</position><price.amount>48.00</price.amount></Point>
    </Period>
  </TimeSeries>
</Publication_MarketDocument>"#;

const SLOW: Duration = Duration::from_secs(2);

/// Hands out queued responses in order and tracks concurrency
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<String>>>,
    when_empty: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            when_empty: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn always(body: &str) -> Self {
        let mut t = Self::new(Vec::new());
        t.when_empty = Some(body.to_string());
        t
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, _request: &PriceRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.responses.lock().unwrap().pop_front();
        match (next, &self.when_empty) {
            (Some(resp), _) => resp,
            (None, Some(body)) => Ok(body.clone()),
            (None, None) => Err(PricewatchError::network("no scripted response")),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<PriceReading>>,
}

impl RecordingSink {
    fn values(&self) -> Vec<f64> {
        self.seen.lock().unwrap().iter().map(|r| r.value).collect()
    }
}

#[async_trait::async_trait]
impl PriceSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, reading: &PriceReading) -> Result<()> {
        self.seen.lock().unwrap().push(reading.clone());
        Ok(())
    }
}

struct FailingSink;

#[async_trait::async_trait]
impl PriceSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn publish(&self, _reading: &PriceReading) -> Result<()> {
        Err(PricewatchError::network("sink down"))
    }
}

fn settings() -> PollerSettings {
    PollerSettings {
        refresh_interval: Duration::from_secs(15 * 60),
        fallback_value: 100.0,
        min_rate: -100.0,
        conversion: UnitConversion::None,
        publish_decimals: None,
        wait_for_ready: false,
        startup_delay: Duration::ZERO,
    }
}

fn day_ahead() -> Box<dyn PriceSource> {
    Box::new(DayAheadSource::new(DayAheadConfig::default()))
}

fn hourly() -> Box<dyn PriceSource> {
    Box::new(HourlyAverageSource::new(HourlyAverageConfig::default()))
}

/// Every request takes two seconds
fn slow_transport() -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY).with_delay(SLOW))
}

fn poller_with(
    settings: PollerSettings,
    source: Box<dyn PriceSource>,
    transport: Arc<ScriptedTransport>,
) -> (PricePoller, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let poller = PricePoller::new(settings, source, transport).with_sink(sink.clone());
    (poller, sink)
}

#[tokio::test]
async fn day_ahead_price_is_published() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(DAY_AHEAD_BODY.into())]));
    let (mut poller, sink) = poller_with(settings(), day_ahead(), transport);

    let reading = poller.poll_once().await;
    assert_eq!(reading.value, 52.31);
    assert!(!reading.fallback);
    assert_eq!(reading.source, "day_ahead");
    assert_eq!(sink.values(), vec![52.31]);
    assert_eq!(poller.current_value(), Some(52.31));
    assert_eq!(poller.stats().failures, 0);
}

#[tokio::test]
async fn failure_publishes_fallback_and_reschedules() {
    let transport = Arc::new(ScriptedTransport::new(vec![Err(PricewatchError::timeout(
        "request timed out",
    ))]));
    let (mut poller, sink) = poller_with(settings(), day_ahead(), transport);

    let reading = poller.poll_once().await;
    assert_eq!(reading.value, 100.0);
    assert!(reading.fallback);
    assert_eq!(sink.values(), vec![100.0]);
    assert!(poller.timer().is_pending());
    assert_eq!(poller.state(), PollerState::Scheduled);

    let stats = poller.stats();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.failures, 1);
    assert!(stats.last_error.unwrap().contains("timed out"));
    assert!(stats.next_poll_at.is_some());
}

#[tokio::test]
async fn hourly_null_price_falls_back() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(r#"{"records":[{"price": null}]}"#.into()),
        Ok(r#"{"records":[{"price": 4.9}]}"#.into()),
    ]));
    let (mut poller, sink) = poller_with(settings(), hourly(), transport);

    assert_eq!(poller.poll_once().await.value, 100.0);
    assert_eq!(poller.poll_once().await.value, 4.9);
    assert_eq!(sink.values(), vec![100.0, 4.9]);
}

#[tokio::test]
async fn unparseable_xml_falls_back() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok("<html>Service Unavailable".into()),
        Ok(DAY_AHEAD_BODY.replace("52.31", "n/a")),
    ]));
    let (mut poller, _sink) = poller_with(settings(), day_ahead(), transport);

    assert!(poller.poll_once().await.fallback);
    assert!(poller.poll_once().await.fallback);
    assert_eq!(poller.stats().failures, 2);
}

#[tokio::test]
async fn conversion_applies_to_prices_but_not_fallback() {
    let mut s = settings();
    s.conversion = UnitConversion::FahrenheitToCelsius;
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(r#"[{"price": "212"}]"#.into()),
        Err(PricewatchError::api("HTTP 503 Service Unavailable: ")),
    ]));
    let (mut poller, _sink) = poller_with(s, hourly(), transport);

    assert_eq!(poller.poll_once().await.value, 100.0);
    let fallback = poller.poll_once().await;
    assert!(fallback.fallback);
    assert_eq!(fallback.value, 100.0);
}

#[tokio::test]
async fn publish_decimals_round_the_value() {
    let mut s = settings();
    s.publish_decimals = Some(1);
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(
        r#"{"records":[{"price": 52.3149}]}"#.into(),
    )]));
    let (mut poller, _sink) = poller_with(s, hourly(), transport);

    assert_eq!(poller.poll_once().await.value, 52.3);
}

#[tokio::test]
async fn out_of_range_values_are_published_unchanged() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(
        r#"{"records":[{"price": 250.5}]}"#.into(),
    )]));
    let (mut poller, _sink) = poller_with(settings(), hourly(), transport);

    let reading = poller.poll_once().await;
    assert_eq!(reading.value, 250.5);
    assert!(!reading.fallback);
}

#[tokio::test]
async fn sink_failure_does_not_stop_other_sinks() {
    let transport = Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY));
    let sink = Arc::new(RecordingSink::default());
    let mut poller = PricePoller::new(settings(), day_ahead(), transport)
        .with_sink(Arc::new(FailingSink))
        .with_sink(sink.clone());

    poller.poll_once().await;
    assert_eq!(sink.values(), vec![52.31]);
}

#[tokio::test]
async fn each_cycle_leaves_exactly_one_timer() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(DAY_AHEAD_BODY.into()),
        Err(PricewatchError::network("connection refused")),
        Ok(DAY_AHEAD_BODY.into()),
    ]));
    let (mut poller, _sink) = poller_with(settings(), day_ahead(), transport);

    for cycle in 1..=3u64 {
        poller.poll_once().await;
        assert!(poller.timer().is_pending());
        assert_eq!(poller.timer().armed_total(), cycle);
        // Every earlier timer was cancelled before the next one was armed
        assert_eq!(poller.timer().cancelled_total(), cycle - 1);
    }
    let remaining = poller.timer().remaining().unwrap();
    assert!(remaining <= Duration::from_secs(15 * 60));
    assert!(remaining > Duration::from_secs(14 * 60));
}

#[tokio::test(start_paused = true)]
async fn loop_polls_once_per_interval() {
    let transport = Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY));
    let (poller, sink) = poller_with(settings(), day_ahead(), transport.clone());
    let handle = poller.handle();
    let task = poller.spawn(Startup::Immediate);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.stats().cycles, 1);
    assert_eq!(handle.current_value(), Some(52.31));
    assert_eq!(handle.state(), PollerState::Scheduled);

    tokio::time::sleep(Duration::from_secs(15 * 60)).await;
    assert_eq!(handle.stats().cycles, 2);

    tokio::time::sleep(Duration::from_secs(30 * 60)).await;
    assert_eq!(handle.stats().cycles, 4);
    assert_eq!(transport.calls(), 4);
    assert_eq!(sink.values().len(), 4);

    handle.shutdown().unwrap();
    let stats = task.await.unwrap();
    assert_eq!(stats.cycles, 4);
}

#[tokio::test(start_paused = true)]
async fn refresh_now_polls_and_restarts_the_interval() {
    let transport = Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY));
    let (poller, _sink) = poller_with(settings(), day_ahead(), transport);
    let handle = poller.handle();
    let task = poller.spawn(Startup::Immediate);

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.refresh_now().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.stats().cycles, 2);

    // The first 15 minute timer was replaced by one armed at the refresh
    tokio::time::sleep(Duration::from_secs(15 * 60 - 30)).await;
    assert_eq!(handle.stats().cycles, 2);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.stats().cycles, 3);

    handle.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let transport = Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY));
    let (poller, _sink) = poller_with(settings(), day_ahead(), transport.clone());
    let handle = poller.handle();
    let task = poller.spawn(Startup::Immediate);

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.shutdown().unwrap();
    let stats = task.await.unwrap();

    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.next_poll_at, None);
    assert_eq!(handle.state(), PollerState::Stopped);

    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    assert_eq!(transport.calls(), 1);
    assert!(handle.refresh_now().is_err());
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_first_poll() {
    let transport = Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY));
    let (poller, _sink) = poller_with(settings(), day_ahead(), transport.clone());
    let handle = poller.handle();
    let task = poller.spawn(Startup::Delay(Duration::from_secs(60)));

    handle.shutdown().unwrap();
    let stats = task.await.unwrap();
    assert_eq!(stats.cycles, 0);
    assert_eq!(transport.calls(), 0);
    assert_eq!(handle.current_value(), None);
}

#[tokio::test(start_paused = true)]
async fn first_poll_waits_for_host_ready() {
    let transport = Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY));
    let (poller, _sink) = poller_with(settings(), day_ahead(), transport.clone());
    let handle = poller.handle();
    let (signal, listener) = ready_channel();
    let task = poller.spawn(Startup::WaitForReady {
        listener,
        fallback_delay: Duration::from_secs(1),
    });

    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert_eq!(transport.calls(), 0);
    assert_eq!(handle.state(), PollerState::Idle);

    signal.notify();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.calls(), 1);

    handle.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn dropped_ready_signal_falls_back_to_delay() {
    let transport = Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY));
    let (poller, _sink) = poller_with(settings(), day_ahead(), transport.clone());
    let handle = poller.handle();
    let (signal, listener) = ready_channel();
    let task = poller.spawn(Startup::WaitForReady {
        listener,
        fallback_delay: Duration::from_secs(30),
    });

    drop(signal);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.calls(), 0);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.calls(), 1);

    handle.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn refresh_flood_collapses_into_one_extra_cycle() {
    let transport = slow_transport();
    let (poller, _sink) = poller_with(settings(), day_ahead(), transport.clone());
    let handle = poller.handle();
    let task = poller.spawn(Startup::Immediate);

    for _ in 0..20 {
        handle.refresh_now().unwrap();
    }
    // Well inside the 15 minute interval
    tokio::time::sleep(Duration::from_secs(5 * 60)).await;

    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls(), 2);
    assert_eq!(handle.stats().cycles, 2);

    handle.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_queued_behind_refreshes_wins() {
    let transport = slow_transport();
    let (poller, _sink) = poller_with(settings(), day_ahead(), transport.clone());
    let handle = poller.handle();
    let task = poller.spawn(Startup::Immediate);

    // First request is in flight
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.refresh_now().unwrap();
    handle.refresh_now().unwrap();
    handle.shutdown().unwrap();

    let stats = task.await.unwrap();
    assert_eq!(stats.cycles, 1);
    assert_eq!(transport.calls(), 1);
    assert_eq!(handle.state(), PollerState::Stopped);
}

#[test]
fn oversized_interval_saturates() {
    let mut cfg = Config::default();
    cfg.poller.refresh_interval_minutes = u64::MAX;
    let s = PollerSettings::from_config(&cfg);
    assert_eq!(s.refresh_interval, Duration::from_secs(u64::MAX));
}

#[tokio::test]
async fn oversized_interval_still_arms_a_timer() {
    let mut s = settings();
    s.refresh_interval = Duration::MAX;
    let transport = Arc::new(ScriptedTransport::always(DAY_AHEAD_BODY));
    let (mut poller, _sink) = poller_with(s, day_ahead(), transport);

    poller.poll_once().await;
    assert!(poller.timer().is_pending());
    assert_eq!(poller.state(), PollerState::Scheduled);
}
