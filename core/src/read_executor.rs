//! Read path: queries answered on the caller's thread.
//!
//! Nothing in here mutates agents or the world. Queries take a short read lock on
//! the one agent they address and may observe a tick that is half-way through
//! applying actions to other agents.

use std::sync::Arc;

use tracing::debug;

use crate::agent::Agent;
use crate::direction::Direction;
use crate::geometry::BlockPos;
use crate::material::{Block, Material};
use crate::presence::OwnerId;
use crate::registry::{read_agent, AgentRegistry};
use crate::RequestError;

/// A cell addressed either relative to the agent or absolutely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Direction(Direction),
    Coordinate(BlockPos),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// The addressed agent itself.
    Robot,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadQuery {
    LocateNonSolidNearby,
    LocateEntity(EntityKind),
    LocateMaterialNearby(Material),
    IdentifyMaterial(Target),
    IsSolid(Target),
    GetInventory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Locations(Vec<BlockPos>),
    Materials(Vec<Material>),
    Boolean(bool),
    /// Per-material totals.
    Inventory(Vec<(Material, u32)>),
}

#[derive(Clone)]
pub struct ReadExecutor {
    registry: Arc<AgentRegistry>,
}

impl ReadExecutor {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    pub fn execute(&self, owner: OwnerId, query: ReadQuery) -> Result<ReadOutcome, RequestError> {
        let handle = self
            .registry
            .lookup(owner)
            .ok_or(RequestError::UnknownAgent)?;

        // Presence lookups must not happen under the agent lock.
        let owner_location = match query {
            ReadQuery::LocateEntity(EntityKind::Owner) => Some(
                self.registry
                    .presence()
                    .online_by_id(owner)
                    .ok_or(RequestError::OwnerUnavailable)?
                    .position
                    .block,
            ),
            _ => None,
        };

        let agent = read_agent(&handle);
        debug!(target: "read_executor", owner = %owner, ?query, "Executing read");
        let outcome = match query {
            ReadQuery::LocateNonSolidNearby => ReadOutcome::Locations(agent.scan_non_solid()),
            ReadQuery::LocateEntity(EntityKind::Robot) => ReadOutcome::Locations(vec![agent.cell()]),
            ReadQuery::LocateEntity(EntityKind::Owner) => {
                ReadOutcome::Locations(owner_location.into_iter().collect())
            }
            ReadQuery::LocateMaterialNearby(material) => {
                ReadOutcome::Locations(agent.scan_material(material))
            }
            ReadQuery::IdentifyMaterial(target) => {
                ReadOutcome::Materials(vec![visible_block(&agent, target)?.material])
            }
            ReadQuery::IsSolid(target) => ReadOutcome::Boolean(visible_block(&agent, target)?.is_solid()),
            ReadQuery::GetInventory => ReadOutcome::Inventory(agent.inventory().totals()),
        };
        Ok(outcome)
    }
}

/// Neighbouring cells are always visible; absolute coordinates must pass the
/// visibility check.
fn visible_block(agent: &Agent, target: Target) -> Result<Block, RequestError> {
    match target {
        Target::Direction(direction) => agent
            .block_in(direction)
            .ok_or_else(|| RequestError::InvalidRequest("target is outside the world".into())),
        Target::Coordinate(pos) => {
            if agent.is_visible(agent.world_name(), pos) {
                Ok(agent.world().block_at(pos))
            } else {
                Err(RequestError::TargetNotVisible)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AvatarKind;
    use crate::geometry::Position;
    use crate::inventory::ItemStack;
    use crate::presence::{MemoryPresence, OwnerPresence};
    use crate::world::{MemoryWorld, WorldDirectory};

    struct Fixture {
        presence: Arc<MemoryPresence>,
        registry: Arc<AgentRegistry>,
        executor: ReadExecutor,
        owner: OwnerId,
    }

    fn fixture() -> Fixture {
        let presence = Arc::new(MemoryPresence::new());
        let registry = Arc::new(AgentRegistry::new(presence.clone()));
        let worlds = WorldDirectory::new().with(Arc::new(MemoryWorld::flat("world", 4)));
        let owner = OwnerId::new_v4();
        registry
            .spawn(&worlds, owner, Some("erin"), "world", BlockPos::new(0, 5, 0), AvatarKind::Pumpkin)
            .unwrap();
        Fixture {
            presence,
            executor: ReadExecutor::new(registry.clone()),
            registry,
            owner,
        }
    }

    #[test]
    fn unknown_agent() {
        let f = fixture();
        let result = f
            .executor
            .execute(OwnerId::new_v4(), ReadQuery::LocateEntity(EntityKind::Robot));
        assert_eq!(result, Err(RequestError::UnknownAgent));
    }

    #[test]
    fn locate_robot_and_owner() {
        let f = fixture();
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::LocateEntity(EntityKind::Robot)),
            Ok(ReadOutcome::Locations(vec![BlockPos::new(0, 5, 0)]))
        );
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::LocateEntity(EntityKind::Owner)),
            Err(RequestError::OwnerUnavailable)
        );
        f.presence.join(OwnerPresence {
            id: f.owner,
            name: "erin".to_string(),
            world: "world".to_string(),
            position: Position::anchored(BlockPos::new(7, 5, -2)),
        });
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::LocateEntity(EntityKind::Owner)),
            Ok(ReadOutcome::Locations(vec![BlockPos::new(7, 5, -2)]))
        );
    }

    #[test]
    fn identify_and_solidity() {
        let f = fixture();
        let below = Target::Direction(Direction::DOWN);
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::IdentifyMaterial(below)),
            Ok(ReadOutcome::Materials(vec![Material::Grass]))
        );
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::IsSolid(below)),
            Ok(ReadOutcome::Boolean(true))
        );
        let near = Target::Coordinate(BlockPos::new(3, 1, 0));
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::IdentifyMaterial(near)),
            Ok(ReadOutcome::Materials(vec![Material::Stone]))
        );
        let far = Target::Coordinate(BlockPos::new(30, 4, 0));
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::IsSolid(far)),
            Err(RequestError::TargetNotVisible)
        );
    }

    #[test]
    fn reads_at_the_edge_of_the_world_do_not_panic() {
        let f = fixture();
        let handle = f.registry.lookup(f.owner).unwrap();
        assert!(crate::registry::write_agent(&handle).teleport(BlockPos::new(0, i32::MAX, 0)));

        let Ok(ReadOutcome::Locations(open)) =
            f.executor.execute(f.owner, ReadQuery::LocateNonSolidNearby)
        else {
            panic!("expected locations");
        };
        assert_eq!(open.len(), 5);
        assert!(matches!(
            f.executor.execute(f.owner, ReadQuery::IsSolid(Target::Direction(Direction::UP))),
            Err(RequestError::InvalidRequest(_))
        ));
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::IsSolid(Target::Direction(Direction::DOWN))),
            Ok(ReadOutcome::Boolean(false))
        );
    }

    #[test]
    fn scans_and_inventory() {
        let f = fixture();
        let Ok(ReadOutcome::Locations(open)) =
            f.executor.execute(f.owner, ReadQuery::LocateNonSolidNearby)
        else {
            panic!("expected locations");
        };
        // Five open neighbours; the sixth is the ground
        assert_eq!(open.len(), 5);

        let handle = f.registry.lookup(f.owner).unwrap();
        crate::registry::write_agent(&handle)
            .inventory_mut()
            .add(ItemStack::new(Material::Dirt, 5));
        assert_eq!(
            f.executor.execute(f.owner, ReadQuery::GetInventory),
            Ok(ReadOutcome::Inventory(vec![(Material::Dirt, 5)]))
        );

        let Ok(ReadOutcome::Locations(grass)) = f
            .executor
            .execute(f.owner, ReadQuery::LocateMaterialNearby(Material::Grass))
        else {
            panic!("expected locations");
        };
        assert_eq!(grass.len(), 20);
        assert!(grass.iter().all(|p| p.y == 4));
    }
}
