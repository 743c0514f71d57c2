//! Periodic trigger for generation passes.
//!
//! Passes never overlap. A trigger that arrives while a pass is running is
//! folded into a single follow-up pass run by whoever holds the pass.

use crate::engine::{Clock, LocalClock, RecurrenceEngine};
use crate::storage::TaskStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// This call ran `passes` passes, counting follow-ups queued meanwhile.
    Ran { passes: usize },
    /// Another caller is mid-pass and will run one more pass.
    Queued,
}

struct PassGate {
    in_flight: AtomicBool,
    pending: AtomicBool,
}

pub struct GenerationScheduler<S, C = LocalClock> {
    engine: Arc<RecurrenceEngine<S, C>>,
    gate: Arc<PassGate>,
    period: Duration,
}

impl<S, C> Clone for GenerationScheduler<S, C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            gate: Arc::clone(&self.gate),
            period: self.period,
        }
    }
}

impl<S: TaskStore, C: Clock> GenerationScheduler<S, C> {
    pub fn new(engine: RecurrenceEngine<S, C>) -> Self {
        Self {
            engine: Arc::new(engine),
            gate: Arc::new(PassGate {
                in_flight: AtomicBool::new(false),
                pending: AtomicBool::new(false),
            }),
            period: DEFAULT_PERIOD,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_secs(1));
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Requests a pass and runs it on this thread unless one is in flight.
    pub fn trigger(&self) -> TriggerOutcome {
        self.gate.pending.store(true, Ordering::SeqCst);
        let mut passes = 0;

        loop {
            if self.gate.in_flight.swap(true, Ordering::SeqCst) {
                if passes == 0 {
                    debug!("generation pass already running, queued a follow-up");
                    return TriggerOutcome::Queued;
                }
                return TriggerOutcome::Ran { passes };
            }

            while self.gate.pending.swap(false, Ordering::SeqCst) {
                self.run_once();
                passes += 1;
            }
            self.gate.in_flight.store(false, Ordering::SeqCst);

            if !self.gate.pending.load(Ordering::SeqCst) {
                return TriggerOutcome::Ran { passes };
            }
        }
    }

    fn run_once(&self) {
        match self.engine.run_generation_pass() {
            Ok(report) if !report.is_clean() => {
                error!(
                    failed = report.failures.len(),
                    "generation pass finished with failures"
                );
            }
            Ok(_) => {}
            Err(err) => error!("generation pass failed: {err}"),
        }
    }
}

impl<S, C> GenerationScheduler<S, C>
where
    S: TaskStore + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Spawns the periodic loop. The first pass runs immediately.
    pub fn run(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            info!(
                period_secs = scheduler.period.as_secs(),
                "recurring task scheduler started"
            );
            let mut interval = tokio::time::interval(scheduler.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                scheduler.trigger();
            }
        })
    }
}
