// Minion Core Library
// Robots in a tick-driven world, commanded from outside the tick thread

pub mod action_executor;
pub mod action_queue;
pub mod agent;
pub mod config;
pub mod direction;
pub mod geometry;
pub mod inventory;
pub mod material;
pub mod presence;
pub mod read_executor;
pub mod registry;
pub mod storage;
pub mod telemetry;
pub mod tick;
pub mod world;

// Export core types
pub use action_executor::{Action, ActionExecutor, ActionResult};
pub use action_queue::{ActionEvent, ActionQueue};
pub use agent::{Agent, AgentSnapshot, AvatarKind};
pub use config::MinionConfig;
pub use direction::{AbsoluteDirection, Compass, Direction, RelativeDirection};
pub use geometry::{BlockPos, Position};
pub use inventory::{Inventory, ItemStack};
pub use material::{Block, Material, Tool};
pub use presence::{MemoryPresence, OwnerId, OwnerPresence, Presence};
pub use read_executor::{EntityKind, ReadExecutor, ReadOutcome, ReadQuery, Target};
pub use registry::AgentRegistry;
pub use storage::{FileStateStore, MemoryStateStore, StateStore};
pub use tick::{TickHandle, TickLoop};
pub use world::{MemoryWorld, World, WorldDirectory};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinionError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Encode error: {0}")]
    EncodeError(#[from] prost::EncodeError),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Unknown world: {0}")]
    UnknownWorld(String),
}
pub type Result<T> = std::result::Result<T, MinionError>;

/// What a client should do after receiving a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    /// Only this request failed.
    FailAction,
    /// The client has nothing left to talk to and should disconnect.
    ExitClient,
}

/// Typed failure of a single request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("no robot exists for this owner")]
    UnknownAgent,

    #[error("owner is not online")]
    OwnerUnavailable,

    #[error("target is not visible to the robot")]
    TargetNotVisible,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("{0}")]
    Unknown(String),
}

impl RequestError {
    /// Stable reason code, matching the wire enum.
    pub fn reason_code(&self) -> i32 {
        match self {
            RequestError::Unknown(_) => 0,
            RequestError::UnknownAgent => 1,
            RequestError::OwnerUnavailable => 2,
            RequestError::TargetNotVisible => 3,
            RequestError::InvalidRequest(_) => 4,
            RequestError::NotImplemented(_) => 5,
        }
    }

    pub fn client_action(&self) -> ClientAction {
        match self {
            RequestError::UnknownAgent => ClientAction::ExitClient,
            _ => ClientAction::FailAction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_agent_asks_client_to_exit() {
        let errors = [
            RequestError::UnknownAgent,
            RequestError::OwnerUnavailable,
            RequestError::TargetNotVisible,
            RequestError::InvalidRequest("x".into()),
            RequestError::NotImplemented("x".into()),
            RequestError::Unknown("x".into()),
        ];
        for e in &errors {
            let expected = if *e == RequestError::UnknownAgent {
                ClientAction::ExitClient
            } else {
                ClientAction::FailAction
            };
            assert_eq!(e.client_action(), expected, "{}", e);
        }
        let mut codes: Vec<i32> = errors.iter().map(|e| e.reason_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
