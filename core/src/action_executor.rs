//! Write path: applies queued actions on the tick thread.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::action_queue::{ActionEvent, ActionQueue};
use crate::direction::Direction;
use crate::geometry::BlockPos;
use crate::material::Material;
use crate::registry::{write_agent, AgentRegistry};
use crate::RequestError;

/// A mutating request, already validated and converted from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move(Direction),
    Turn(Direction),
    Mine(Direction),
    Place { direction: Direction, material: Material },
    Chat { text: String, public: bool },
    Teleport(BlockPos),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Move(_) => "move",
            Action::Turn(_) => "turn",
            Action::Mine(_) => "mine",
            Action::Place { .. } => "place",
            Action::Chat { .. } => "chat",
            Action::Teleport(_) => "teleport",
        }
    }
}

/// Outcome of one action, correlated by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub key: Option<i64>,
    pub success: bool,
    /// Set only for late failures, e.g. the agent vanished while queued.
    pub error: Option<RequestError>,
}

impl ActionResult {
    pub fn new(key: Option<i64>, success: bool) -> Self {
        Self {
            key,
            success,
            error: None,
        }
    }

    pub fn failed(key: Option<i64>, error: RequestError) -> Self {
        Self {
            key,
            success: false,
            error: Some(error),
        }
    }
}

pub struct ActionExecutor {
    registry: Arc<AgentRegistry>,
    queue: Arc<ActionQueue>,
    late_failure_replies: bool,
}

impl ActionExecutor {
    pub fn new(registry: Arc<AgentRegistry>, queue: Arc<ActionQueue>) -> Self {
        Self {
            registry,
            queue,
            late_failure_replies: false,
        }
    }

    /// Answer events whose agent disappeared with an explicit failure instead of
    /// dropping them.
    pub fn with_late_failure_replies(mut self, enabled: bool) -> Self {
        self.late_failure_replies = enabled;
        self
    }

    pub fn queue(&self) -> &Arc<ActionQueue> {
        &self.queue
    }

    /// Drain the queue, applying every event. Returns how many events were taken.
    #[instrument(target = "action_executor", skip(self))]
    pub fn run_once(&self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.queue.dequeue_one() {
            processed += 1;
            self.apply(event);
        }
        if processed > 0 {
            debug!(target: "action_executor", processed, "Queue drained");
        }
        processed
    }

    fn apply(&self, event: ActionEvent) {
        let Some(handle) = self.registry.lookup(event.owner) else {
            if self.late_failure_replies {
                warn!(target: "action_executor", owner = %event.owner, key = ?event.key, "Agent gone, failing action");
                let key = event.key;
                event.complete(ActionResult::failed(key, RequestError::UnknownAgent));
            } else {
                warn!(target: "action_executor", owner = %event.owner, key = ?event.key, "Agent gone, dropping action");
            }
            return;
        };

        // Resolved before the agent lock is taken.
        let owner_name = match &event.action {
            Action::Chat { public: true, .. } => Some(
                self.registry
                    .name_of(event.owner)
                    .unwrap_or_else(|| event.owner.to_string()),
            ),
            _ => None,
        };

        let success = {
            let mut agent = write_agent(&handle);
            match &event.action {
                Action::Move(direction) => agent.move_in(*direction),
                Action::Turn(direction) => agent.turn(*direction),
                Action::Mine(direction) => agent.mine(*direction),
                Action::Place {
                    direction,
                    material,
                } => agent.place(*direction, *material),
                Action::Chat { text, public: false } => {
                    agent.message_owner(self.registry.presence(), text)
                }
                Action::Chat { text, public: true } => agent.message_all(
                    self.registry.presence(),
                    owner_name.as_deref().unwrap_or_default(),
                    text,
                ),
                Action::Teleport(to) => agent.teleport(*to),
            }
        };

        debug!(
            target: "action_executor",
            owner = %event.owner,
            key = ?event.key,
            action = event.action.name(),
            success,
            "Action applied"
        );
        let key = event.key;
        event.complete(ActionResult::new(key, success));
    }
}
