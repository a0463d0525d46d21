use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;

use minion_core::{ActionQueue, AgentRegistry};

pub mod codec;
pub mod convert;
pub mod dispatcher;
mod server;

pub use dispatcher::Dispatcher;
pub use server::{start_server, ServerHandle};

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("connection closed mid-frame")]
    Truncated,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// An open client connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub peer: SocketAddr,
    pub opened_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct BridgeState {
    pub dispatcher: Dispatcher,
    pub max_frame_len: usize,
    // connection id -> peer info
    pub connections: Arc<DashMap<u64, ConnectionInfo>>,
}

impl BridgeState {
    pub fn new(registry: Arc<AgentRegistry>, queue: Arc<ActionQueue>, max_frame_len: usize) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry, queue),
            max_frame_len,
            connections: Arc::new(DashMap::new()),
        }
    }
}
