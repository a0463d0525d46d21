//! Live agents, keyed by owner identity.
//!
//! Each agent sits behind its own `RwLock`. The tick thread takes short write
//! locks to apply actions; the read path takes short read locks from any thread.
//! Two best-effort caches map display names to identities and back; they are
//! repaired whenever the presence collaborator sees the owner online.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentSnapshot, AvatarKind};
use crate::geometry::{BlockPos, Position};
use crate::inventory::ItemStack;
use crate::presence::{OwnerId, Presence};
use crate::storage::{AgentRecord, StateStore};
use crate::world::WorldDirectory;
use crate::Result;

/// Items further away than this are not routed to any agent.
pub const PICKUP_RANGE: f64 = 3.0;

pub type AgentHandle = Arc<RwLock<Agent>>;

pub struct AgentRegistry {
    agents: DashMap<OwnerId, AgentHandle>,
    ids_by_name: DashMap<String, OwnerId>,
    names_by_id: DashMap<OwnerId, String>,
    presence: Arc<dyn Presence>,
}

/// Lock helpers. Agent state is plain data, so a poisoned lock is still usable.
pub fn read_agent(handle: &AgentHandle) -> RwLockReadGuard<'_, Agent> {
    handle.read().unwrap_or_else(|e| e.into_inner())
}

pub fn write_agent(handle: &AgentHandle) -> RwLockWriteGuard<'_, Agent> {
    handle.write().unwrap_or_else(|e| e.into_inner())
}

impl AgentRegistry {
    pub fn new(presence: Arc<dyn Presence>) -> Self {
        Self {
            agents: DashMap::new(),
            ids_by_name: DashMap::new(),
            names_by_id: DashMap::new(),
            presence,
        }
    }

    pub fn presence(&self) -> &dyn Presence {
        self.presence.as_ref()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn contains(&self, owner: OwnerId) -> bool {
        self.agents.contains_key(&owner)
    }

    pub fn owners(&self) -> Vec<OwnerId> {
        self.agents.iter().map(|e| *e.key()).collect()
    }

    /// The agent owned by `owner`.
    pub fn lookup(&self, owner: OwnerId) -> Option<AgentHandle> {
        self.agents.get(&owner).map(|e| e.value().clone())
    }

    /// Resolve a display name to an identity.
    ///
    /// The presence collaborator is asked first because a name may have moved to
    /// another player; the cache is only used while the owner is offline.
    pub fn resolve_name(&self, name: &str) -> Option<OwnerId> {
        if let Some(online) = self.presence.online_by_name(name) {
            self.observe(online.id, &online.name);
            return Some(online.id);
        }
        self.ids_by_name.get(name).map(|e| *e.value())
    }

    /// The agent whose owner is called `name`.
    pub fn lookup_name(&self, name: &str) -> Option<(OwnerId, AgentHandle)> {
        let owner = self.resolve_name(name)?;
        self.lookup(owner).map(|agent| (owner, agent))
    }

    /// Last known display name of `owner`.
    pub fn name_of(&self, owner: OwnerId) -> Option<String> {
        if let Some(online) = self.presence.online_by_id(owner) {
            self.observe(owner, &online.name);
            return Some(online.name);
        }
        self.names_by_id.get(&owner).map(|e| e.value().clone())
    }

    /// Record that `owner` currently goes by `name`, dropping stale mappings.
    pub fn observe(&self, owner: OwnerId, name: &str) {
        if let Some(old) = self.names_by_id.get(&owner).map(|e| e.value().clone()) {
            if old == name {
                return;
            }
            self.ids_by_name.remove_if(&old, |_, id| *id == owner);
        }
        if let Some(previous) = self.ids_by_name.insert(name.to_string(), owner) {
            if previous != owner {
                self.names_by_id.remove_if(&previous, |_, n| n == name);
            }
        }
        self.names_by_id.insert(owner, name.to_string());
        debug!(target: "registry", owner = %owner, name, "Name cache updated");
    }

    /// Register an agent that is already in the world. Any agent the owner
    /// already had is torn down afterwards; use [`AgentRegistry::spawn`] when
    /// both may share a cell.
    pub fn add(&self, owner: OwnerId, name: Option<&str>, agent: Agent) -> AgentHandle {
        if let Some(name) = name {
            self.observe(owner, name);
        }
        let handle = Arc::new(RwLock::new(agent));
        if let Some(previous) = self.agents.insert(owner, handle.clone()) {
            warn!(target: "registry", owner = %owner, "Replacing existing agent");
            write_agent(&previous).teardown();
        }
        info!(target: "registry", owner = %owner, agents = self.agents.len(), "Agent registered");
        handle
    }

    /// Create an agent in `world` at `cell` and register it.
    pub fn spawn(
        &self,
        worlds: &WorldDirectory,
        owner: OwnerId,
        name: Option<&str>,
        world: &str,
        cell: BlockPos,
        avatar: AvatarKind,
    ) -> Result<AgentHandle> {
        let world = worlds.get(world)?;
        // The old avatar must leave the world before the new one is drawn.
        if let Some((_, previous)) = self.agents.remove(&owner) {
            warn!(target: "registry", owner = %owner, "Replacing existing agent");
            write_agent(&previous).teardown();
        }
        let agent = Agent::spawn(owner, world, cell, avatar);
        Ok(self.add(owner, name, agent))
    }

    /// Tear down and forget the agent of `owner`.
    pub fn remove(&self, owner: OwnerId) -> bool {
        match self.agents.remove(&owner) {
            Some((_, handle)) => {
                write_agent(&handle).teardown();
                if let Some((_, name)) = self.names_by_id.remove(&owner) {
                    self.ids_by_name.remove_if(&name, |_, id| *id == owner);
                }
                info!(target: "registry", owner = %owner, "Agent removed");
                true
            }
            None => false,
        }
    }

    /// Handles of every live agent. Membership changes after the call are not
    /// reflected, so callers can iterate without holding map guards.
    pub fn handles(&self) -> Vec<AgentHandle> {
        self.agents.iter().map(|e| e.value().clone()).collect()
    }

    /// Run `f` on every agent with a write lock held for that agent only.
    pub fn for_each_mut(&self, mut f: impl FnMut(&mut Agent)) {
        for handle in self.handles() {
            f(&mut write_agent(&handle));
        }
    }

    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.handles()
            .iter()
            .map(|h| read_agent(h).snapshot())
            .collect()
    }

    /// Hand an item that appeared at `at` to the nearest agent within
    /// [`PICKUP_RANGE`]. Returns the owner of the agent that took it.
    ///
    /// Called by the host engine when an item entity spawns in a world.
    /// [`MemoryWorld`](crate::world::MemoryWorld) has no item entities, and
    /// mining hands its drops straight to the miner, so nothing in this crate
    /// calls it.
    pub fn route_drop(&self, world: &str, at: Position, stack: ItemStack) -> Option<OwnerId> {
        let nearest = self
            .handles()
            .into_iter()
            .filter_map(|handle| {
                let distance = {
                    let agent = read_agent(&handle);
                    if agent.world_name() != world {
                        return None;
                    }
                    agent.position().distance_to(&at)
                };
                (distance <= PICKUP_RANGE).then_some((distance, handle))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))?;

        let mut agent = write_agent(&nearest.1);
        if agent.pick_up(stack) {
            Some(agent.owner())
        } else {
            None
        }
    }

    fn records(&self) -> Vec<AgentRecord> {
        self.snapshot()
            .into_iter()
            .map(|s| {
                let name = self.names_by_id.get(&s.owner).map(|e| e.value().clone());
                AgentRecord::from_snapshot(s, name)
            })
            .collect()
    }

    /// Write every agent to `store`.
    pub fn persist(&self, store: &dyn StateStore) -> Result<usize> {
        let records = self.records();
        store.save(&records)?;
        Ok(records.len())
    }

    /// Re-create persisted agents. Agents already live are left alone.
    pub fn load(&self, store: &dyn StateStore, worlds: &WorldDirectory) -> Result<usize> {
        let Some(records) = store.load()? else {
            return Ok(0);
        };
        let mut loaded = 0;
        for record in records {
            if self.contains(record.owner) {
                continue;
            }
            let world = match worlds.get(&record.world) {
                Ok(world) => world,
                Err(e) => {
                    warn!(target: "registry", owner = %record.owner, error = %e, "Skipping persisted agent");
                    continue;
                }
            };
            let agent = Agent::restore(
                record.owner,
                world,
                record.cell,
                record.facing,
                record.inventory,
                record.avatar,
            );
            self.add(record.owner, record.name.as_deref(), agent);
            loaded += 1;
        }
        info!(target: "registry", loaded, "Persisted agents loaded");
        Ok(loaded)
    }

    /// Persist everything, then tear down every agent. Teardown happens even if
    /// saving failed; the save error is returned afterwards.
    pub fn shutdown(&self, store: &dyn StateStore) -> Result<()> {
        let saved = self.persist(store);
        for owner in self.owners() {
            self.remove(owner);
        }
        match saved {
            Ok(count) => {
                info!(target: "registry", saved = count, "Registry shut down");
                Ok(())
            }
            Err(e) => {
                warn!(target: "registry", error = %e, "Final save failed");
                Err(e)
            }
        }
    }
}
