//! Poll and heartbeat timers driving the bridge.
//!
//! Everything runs in one cooperative loop: a poll tick, a heartbeat tick
//! and an external write are handled one at a time, so cycles never
//! overlap and the store has a single writer.

use std::future::pending;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lambda_common::TelemetryValue;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::client::RegisterClient;
use crate::cycle::{CycleReport, PollCycle};
use crate::sink::{ExternalWrite, TelemetrySink, flush};
use crate::state::BridgeState;
use crate::store::PublishStore;

/// Timers are idle until the controller connection is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Armed,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// `None` disables the heartbeat.
    pub heartbeat_interval: Option<Duration>,
    /// Path whose value the heartbeat reports.
    pub headline_path: String,
}

/// What the heartbeat reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    pub last_update: Option<DateTime<Utc>>,
    pub headline: Option<TelemetryValue>,
    pub cycles_completed: u64,
    pub cycles_abandoned: u64,
    pub failed_reads: u64,
    /// Heartbeats sent so far, this one included.
    pub beats: u64,
}

pub struct Scheduler<C, S> {
    client: C,
    sink: S,
    cycle: PollCycle,
    store: PublishStore,
    state: BridgeState,
    config: SchedulerConfig,
    timers: TimerState,
    external: Option<mpsc::Receiver<ExternalWrite>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C: RegisterClient, S: TelemetrySink> Scheduler<C, S> {
    pub fn new(
        client: C,
        sink: S,
        cycle: PollCycle,
        store: PublishStore,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            client,
            sink,
            cycle,
            store,
            state: BridgeState::new(),
            config,
            timers: TimerState::Idle,
            external: None,
            shutdown: None,
        }
    }

    /// Deliver external writes from `rx` into the loop.
    pub fn with_external_writes(mut self, rx: mpsc::Receiver<ExternalWrite>) -> Self {
        self.external = Some(rx);
        self
    }

    /// Stop the loop once `rx` turns `true`.
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(rx);
        self
    }

    pub fn timer_state(&self) -> TimerState {
        self.timers
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn store(&self) -> &PublishStore {
        &self.store
    }

    /// Publish the registered paths, connect, then poll until shutdown.
    ///
    /// Returns the final bridge state.
    pub async fn run(mut self) -> BridgeState {
        let mut shutdown = self.shutdown.take();
        let mut external = self.external.take();

        let initial = self.store.take_dirty();
        let stats = flush(&self.sink, &initial).await;
        info!(
            service = %self.store.service(),
            published = stats.success,
            failed = stats.failed,
            "Registered bus paths"
        );

        if !self.arm(&mut shutdown).await {
            self.client.close().await;
            return self.state;
        }

        let poll_interval = self.config.poll_interval;
        let mut poll = ticker(poll_interval);
        let mut heartbeat = self.config.heartbeat_interval.map(ticker);

        info!(
            interval_ms = poll_interval.as_millis() as u64,
            heartbeat_secs = self.config.heartbeat_interval.map(|d| d.as_secs()),
            registers = self.cycle.registers().len(),
            "Starting poll loop"
        );

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    self.poll_tick().await;
                }
                _ = next_tick(&mut heartbeat) => {
                    self.heartbeat();
                }
                write = next_write(&mut external) => match write {
                    Some(write) => self.handle_external(&write),
                    None => {
                        debug!("External write channel closed");
                        external = None;
                    }
                },
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown signal received, stopping poll loop");
                    break;
                }
            }
        }

        self.client.close().await;
        info!(
            cycles = self.state.cycles_completed(),
            abandoned = self.state.cycles_abandoned(),
            heartbeats = self.state.heartbeats(),
            "Poll loop stopped"
        );
        self.state
    }

    /// Connect, retrying every poll interval; `false` if shutdown came first.
    async fn arm(&mut self, shutdown: &mut Option<watch::Receiver<bool>>) -> bool {
        loop {
            match self.client.connect().await {
                Ok(()) => {
                    self.timers = TimerState::Armed;
                    info!("Connected to heat pump, timers armed");
                    return true;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_ms = self.config.poll_interval.as_millis() as u64,
                        "Failed to connect to heat pump"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown_requested(shutdown) => return false,
            }
        }
    }

    /// Run one poll cycle and publish what changed.
    ///
    /// An abandoned cycle is logged as critical; the next tick runs as usual.
    pub async fn poll_tick(&mut self) -> Option<CycleReport> {
        let result = self
            .cycle
            .run(&mut self.client, &mut self.store, &mut self.state)
            .await;

        let report = match result {
            Ok(report) => Some(report),
            Err(e) => {
                self.state.abandon_cycle();
                error!(severity = "critical", error = %e, "Poll cycle abandoned");
                None
            }
        };

        let points = self.store.take_dirty();
        let stats = flush(&self.sink, &points).await;
        if stats.failed > 0 {
            debug!(failed = stats.failed, total = stats.total(), "Some values were not published");
        }

        report
    }

    /// Log the sign of life; nothing is read or written.
    pub fn heartbeat(&mut self) -> Heartbeat {
        let beats = self.state.record_heartbeat();
        let headline = self.store.read(&self.config.headline_path).cloned();
        let headline_text = self
            .store
            .text(&self.config.headline_path)
            .unwrap_or_else(|| "n/a".to_string());
        let last_update = self.state.last_update();
        let last_update_text = last_update
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        info!(
            last_update = %last_update_text,
            headline = %headline_text,
            cycles = self.state.cycles_completed(),
            abandoned = self.state.cycles_abandoned(),
            failed_reads = self.state.failed_reads(),
            beats,
            "Sign of life"
        );

        Heartbeat {
            last_update,
            headline,
            cycles_completed: self.state.cycles_completed(),
            cycles_abandoned: self.state.cycles_abandoned(),
            failed_reads: self.state.failed_reads(),
            beats,
        }
    }

    /// Report a write made by someone else on the bus.
    ///
    /// The store keeps the polled value and nothing is republished.
    pub fn handle_external(&self, write: &ExternalWrite) {
        match self.store.apply_external(&write.path, &write.value) {
            Ok(()) => {
                debug!(path = %write.path, "External write reported, keeping polled value");
            }
            Err(e) => {
                warn!(path = %write.path, error = %e, "Rejected external write");
            }
        }
    }
}

/// Interval whose first tick is one period from now.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn next_write(rx: &mut Option<mpsc::Receiver<ExternalWrite>>) -> Option<ExternalWrite> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

/// Resolves once shutdown is signalled; never without a receiver.
async fn shutdown_requested(rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = rx else {
        return pending().await;
    };

    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return pending().await;
        }
    }
}
