//! Bridge test harness: a real TCP server on an ephemeral port with a tick
//! executor that the test steps by hand.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use minion_bridge::codec::{read_frame, write_frame};
use minion_bridge::{start_server, BridgeState, ServerHandle};
use minion_core::{
    ActionExecutor, ActionQueue, AgentRegistry, AvatarKind, BlockPos, MemoryPresence,
    MemoryWorld, OwnerId, World, WorldDirectory,
};
use minion_proto::{Message, RobotRequest, RobotResponse};
use tokio::net::TcpStream;

pub const MAX_FRAME: usize = 1024 * 1024;
pub const SPAWN: BlockPos = BlockPos::new(0, 5, 0);

pub struct Harness {
    pub server: ServerHandle,
    pub registry: Arc<AgentRegistry>,
    pub presence: Arc<MemoryPresence>,
    pub queue: Arc<ActionQueue>,
    pub executor: ActionExecutor,
    pub world: Arc<MemoryWorld>,
    pub owner: OwnerId,
}

impl Harness {
    /// One agent owned by "alice", standing on flat ground at [`SPAWN`], facing SOUTH.
    pub async fn start() -> Self {
        let world = Arc::new(MemoryWorld::flat("world", 4));
        let worlds = WorldDirectory::new().with(world.clone());
        let presence = Arc::new(MemoryPresence::new());
        let registry = Arc::new(AgentRegistry::new(presence.clone()));
        let owner = OwnerId::new_v4();
        registry
            .spawn(&worlds, owner, Some("alice"), "world", SPAWN, AvatarKind::Pumpkin)
            .expect("spawn agent");

        let queue = Arc::new(ActionQueue::new());
        let executor = ActionExecutor::new(registry.clone(), queue.clone());
        let state = BridgeState::new(registry.clone(), queue.clone(), MAX_FRAME);
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = start_server(addr, state).await.expect("start server");

        Self {
            server,
            registry,
            presence,
            queue,
            executor,
            world,
            owner,
        }
    }

    pub async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.server.local_addr())
            .await
            .expect("connect client");
        Client { stream }
    }

    /// Wait until the server has queued `n` actions, then run one tick's drain.
    pub async fn tick_after(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.queue.len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("actions were queued");
        self.executor.run_once();
    }

    pub fn agent_cell(&self) -> BlockPos {
        let handle = self.registry.lookup(self.owner).expect("agent exists");
        let cell = minion_core::registry::read_agent(&handle).cell();
        cell
    }

    pub fn block(&self, pos: BlockPos) -> minion_core::Block {
        self.world.block_at(pos)
    }
}

pub struct Client {
    pub stream: TcpStream,
}

impl Client {
    pub async fn send(&mut self, request: &RobotRequest) {
        write_frame(&mut self.stream, &request.encode_to_vec())
            .await
            .expect("send request");
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        use tokio::io::AsyncWriteExt;
        self.stream.write_all(bytes).await.expect("send bytes");
    }

    /// Next response, or `None` if the server closed the connection.
    pub async fn recv(&mut self) -> Option<RobotResponse> {
        let frame = tokio::time::timeout(Duration::from_secs(2), read_frame(&mut self.stream, MAX_FRAME))
            .await
            .expect("timely response")
            .ok()??;
        Some(RobotResponse::decode(frame.as_slice()).expect("decodable response"))
    }
}
