//! The authoritative tick.
//!
//! [`TickLoop`] owns the only code path that mutates agents and worlds. It runs on
//! a dedicated OS thread at a fixed rate; tests drive it by calling
//! [`TickLoop::tick`] directly.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::action_executor::ActionExecutor;
use crate::agent::Agent;
use crate::config::MinionConfig;
use crate::registry::AgentRegistry;
use crate::storage::StateStore;
use crate::telemetry::{TickMetrics, TickStats};
use crate::Result;

/// How often each job runs, in ticks. Zero disables a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    pub period: Duration,
    pub action_interval: u64,
    pub facing_interval: u64,
    pub hover_interval: u64,
    pub autosave_interval: u64,
}

impl TickSchedule {
    pub fn from_config(config: &MinionConfig) -> Self {
        Self {
            period: config.tick_period(),
            action_interval: config.action_interval_ticks,
            facing_interval: config.facing_upkeep_interval_ticks,
            hover_interval: config.hover_upkeep_interval_ticks,
            autosave_interval: config.autosave_interval_ticks,
        }
    }
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(50),
            action_interval: 1,
            facing_interval: 2,
            hover_interval: 10,
            autosave_interval: 6000,
        }
    }
}

fn due(tick: u64, interval: u64) -> bool {
    interval > 0 && tick % interval == 0
}

pub struct TickLoop {
    executor: Arc<ActionExecutor>,
    registry: Arc<AgentRegistry>,
    store: Option<Arc<dyn StateStore>>,
    schedule: TickSchedule,
    metrics: Arc<TickMetrics>,
    tick: u64,
}

impl TickLoop {
    pub fn new(
        executor: Arc<ActionExecutor>,
        registry: Arc<AgentRegistry>,
        schedule: TickSchedule,
    ) -> Self {
        Self {
            executor,
            registry,
            store: None,
            schedule,
            metrics: Arc::new(TickMetrics::new()),
            tick: 0,
        }
    }

    /// Enable autosave into `store`.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn metrics(&self) -> Arc<TickMetrics> {
        self.metrics.clone()
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Run one tick. A panic inside the tick is logged and swallowed.
    pub fn tick(&mut self) {
        self.tick += 1;
        let started = Instant::now();
        let tick = self.tick;
        if catch_unwind(AssertUnwindSafe(|| self.run_jobs(tick))).is_err() {
            self.metrics.record_panic();
            error!(target: "tick", tick, "Tick panicked; continuing");
        }
        self.metrics.record_tick(started.elapsed(), self.schedule.period);
    }

    fn run_jobs(&self, tick: u64) {
        let s = &self.schedule;
        if due(tick, s.action_interval) {
            let processed = self.executor.run_once();
            self.metrics.record_actions(processed);
        }
        if due(tick, s.facing_interval) {
            self.registry.for_each_mut(Agent::upkeep);
        }
        if due(tick, s.hover_interval) {
            self.registry.for_each_mut(Agent::hover_upkeep);
        }
        if due(tick, s.autosave_interval) {
            if let Some(store) = &self.store {
                match self.registry.persist(store.as_ref()) {
                    Ok(_) => self.metrics.record_save(true),
                    Err(e) => {
                        self.metrics.record_save(false);
                        warn!(target: "tick", tick, error = %e, "Autosave failed");
                    }
                }
            }
        }
    }

    /// Move the loop onto its own thread.
    pub fn spawn(mut self) -> Result<TickHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let metrics = self.metrics.clone();
        let flag = stop.clone();
        let thread = thread::Builder::new()
            .name("minion-tick".into())
            .spawn(move || {
                let period = self.schedule.period;
                info!(target: "tick", period_ms = period.as_millis() as u64, "Tick loop started");
                let mut next = Instant::now();
                while !flag.load(Ordering::Acquire) {
                    self.tick();
                    next += period;
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    } else {
                        // Too far behind; don't try to catch up with a burst.
                        next = now;
                    }
                }
                info!(target: "tick", ticks = self.tick, "Tick loop stopped");
            })?;
        Ok(TickHandle {
            stop,
            thread: Some(thread),
            metrics,
        })
    }
}

/// Owner of a running tick thread. Dropping it stops the thread.
pub struct TickHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    metrics: Arc<TickMetrics>,
}

impl TickHandle {
    pub fn stats(&self) -> TickStats {
        self.metrics.snapshot()
    }

    /// Signal the thread and wait for the tick in progress to finish.
    pub fn stop(mut self) -> TickStats {
        self.shutdown();
        self.metrics.snapshot()
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(target: "tick", "Tick thread panicked");
            }
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_executor::Action;
    use crate::action_queue::{ActionEvent, ActionQueue};
    use crate::agent::AvatarKind;
    use crate::direction::Direction;
    use crate::geometry::BlockPos;
    use crate::presence::{MemoryPresence, OwnerId};
    use crate::storage::MemoryStateStore;
    use crate::world::{MemoryWorld, WorldDirectory};

    fn setup(schedule: TickSchedule) -> (Arc<AgentRegistry>, Arc<ActionQueue>, TickLoop, OwnerId) {
        let registry = Arc::new(AgentRegistry::new(Arc::new(MemoryPresence::new())));
        let worlds = WorldDirectory::new().with(Arc::new(MemoryWorld::new("world")));
        let owner = OwnerId::new_v4();
        registry
            .spawn(&worlds, owner, None, "world", BlockPos::new(0, 0, 0), AvatarKind::Hover)
            .unwrap();
        let queue = Arc::new(ActionQueue::new());
        let executor = Arc::new(ActionExecutor::new(registry.clone(), queue.clone()));
        let tick = TickLoop::new(executor, registry.clone(), schedule);
        (registry, queue, tick, owner)
    }

    #[test]
    fn actions_drain_on_their_interval() {
        let schedule = TickSchedule {
            action_interval: 2,
            ..TickSchedule::default()
        };
        let (_, queue, mut tick, owner) = setup(schedule);
        queue.enqueue(ActionEvent::new(owner, None, Action::Move(Direction::UP), |_| {}));
        tick.tick();
        assert_eq!(queue.len(), 1);
        tick.tick();
        assert!(queue.is_empty());
        assert_eq!(tick.metrics().snapshot().actions, 1);
    }

    #[test]
    fn panicking_callback_does_not_kill_the_loop() {
        let (_, queue, mut tick, owner) = setup(TickSchedule::default());
        queue.enqueue(ActionEvent::new(owner, None, Action::Move(Direction::UP), |_| {
            panic!("callback exploded")
        }));
        tick.tick();
        tick.tick();
        let stats = tick.metrics().snapshot();
        assert_eq!(stats.panics, 1);
        assert_eq!(stats.ticks, 2);
    }

    #[test]
    fn autosave_writes_store() {
        let schedule = TickSchedule {
            autosave_interval: 3,
            ..TickSchedule::default()
        };
        let (_, _, tick, _) = setup(schedule);
        let store = Arc::new(MemoryStateStore::new());
        let mut tick = tick.with_store(store.clone());
        tick.tick();
        tick.tick();
        assert_eq!(store.load().unwrap(), None);
        tick.tick();
        assert_eq!(store.load().unwrap().map(|r| r.len()), Some(1));
    }

    #[test]
    fn threaded_loop_processes_and_stops() {
        let schedule = TickSchedule {
            period: Duration::from_millis(5),
            ..TickSchedule::default()
        };
        let (registry, queue, tick, owner) = setup(schedule);
        let (event, rx) = ActionEvent::channel(owner, Some(7), Action::Move(Direction::UP));
        queue.enqueue(event);
        let handle = tick.spawn().unwrap();
        let result = rx.blocking_recv().unwrap();
        assert!(result.success);
        let stats = handle.stop();
        assert!(stats.ticks >= 1);
        let agent = registry.lookup(owner).unwrap();
        assert_eq!(crate::registry::read_agent(&agent).cell(), BlockPos::new(0, 1, 0));
    }
}
