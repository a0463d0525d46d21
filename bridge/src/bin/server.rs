use std::collections::BTreeSet;
use std::sync::Arc;

use minion_bridge::{start_server, BridgeState};
use minion_core::storage::{FileStateStore, StateStore};
use minion_core::telemetry::init_tracing;
use minion_core::tick::TickSchedule;
use minion_core::{
    ActionExecutor, ActionQueue, AgentRegistry, MemoryPresence, MemoryWorld, MinionConfig,
    TickLoop, WorldDirectory,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = MinionConfig::load();
    init_tracing(&config.log_level);

    // Flat worlds for the default world and every world a spawn entry names
    let mut names = BTreeSet::new();
    names.insert(config.default_world.clone());
    names.extend(config.spawn.iter().filter_map(|s| s.world.clone()));
    let mut worlds = WorldDirectory::new();
    worlds.insert(Arc::new(MemoryWorld::flat(
        config.default_world.clone(),
        config.ground_level,
    )));
    for name in names.into_iter().filter(|n| *n != config.default_world) {
        worlds.insert(Arc::new(MemoryWorld::flat(name, config.ground_level)));
    }

    let presence = Arc::new(MemoryPresence::new());
    let registry = Arc::new(AgentRegistry::new(presence));
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(&config.state_path));
    registry.load(store.as_ref(), &worlds)?;
    for entry in &config.spawn {
        if registry.contains(entry.owner) {
            continue;
        }
        let world = entry.world.as_deref().unwrap_or(&config.default_world);
        registry.spawn(
            &worlds,
            entry.owner,
            entry.name.as_deref(),
            world,
            entry.cell(),
            entry.avatar,
        )?;
    }

    let queue = Arc::new(ActionQueue::new());
    let executor = Arc::new(
        ActionExecutor::new(registry.clone(), queue.clone())
            .with_late_failure_replies(config.late_failure_replies),
    );
    let tick = TickLoop::new(executor, registry.clone(), TickSchedule::from_config(&config))
        .with_store(store.clone())
        .spawn()?;

    let state = BridgeState::new(registry.clone(), queue, config.max_frame_len);
    let server = start_server(config.bind_addr, state).await?;
    tracing::info!(addr = %server.local_addr(), agents = registry.len(), "Minions server ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    // Order matters: no new clients, no more ticks, save, tear down, then hang up.
    server.stop_accepting();
    let stats = tick.stop();
    tracing::info!(ticks = stats.ticks, actions = stats.actions, overruns = stats.overruns, "Tick loop stopped");
    let saved = registry.shutdown(store.as_ref());
    server.shutdown().await;

    saved.map_err(|e| e.into())
}
