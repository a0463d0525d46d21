// Tracing setup and tick counters
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber: `RUST_LOG` if set, otherwise `default_level`,
/// printed with the compact formatter.
///
/// Returns false if a subscriber was already installed (e.g. by an earlier call
/// or a test harness); that is not an error.
pub fn init_tracing(default_level: &str) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init()
        .is_ok();
    if installed {
        info!(target: "telemetry", level = %default_level, "Tracing initialized");
    }
    installed
}

/// Counters maintained by the tick loop. Cheap to update from the tick thread and
/// readable from anywhere.
#[derive(Debug, Default)]
pub struct TickMetrics {
    ticks: AtomicU64,
    actions: AtomicU64,
    overruns: AtomicU64,
    panics: AtomicU64,
    saves: AtomicU64,
    save_failures: AtomicU64,
    slowest_tick_us: AtomicU64,
}

/// Point-in-time copy of [`TickMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TickStats {
    pub ticks: u64,
    pub actions: u64,
    pub overruns: u64,
    pub panics: u64,
    pub saves: u64,
    pub save_failures: u64,
    pub slowest_tick_us: u64,
}

impl TickMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self, elapsed: Duration, budget: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.slowest_tick_us.fetch_max(us, Ordering::Relaxed);
        if elapsed > budget {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_actions(&self, count: usize) {
        self.actions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save(&self, ok: bool) {
        if ok {
            self.saves.fetch_add(1, Ordering::Relaxed);
        } else {
            self.save_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> TickStats {
        TickStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            actions: self.actions.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            slowest_tick_us: self.slowest_tick_us.load(Ordering::Relaxed),
        }
    }
}
