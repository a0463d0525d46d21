//! Persisted agent state.
//!
//! The on-disk format is the protobuf `PluginState` message. Agents are keyed by
//! owner identity; the stored name is advisory. [`FileStateStore`] replaces the
//! file atomically (write to a temp file, then rename) so a crash mid-save leaves
//! the previous state intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use minion_proto::{world_location, Message};
use tracing::{info, warn};

use crate::agent::{AgentSnapshot, AvatarKind};
use crate::direction::Compass;
use crate::geometry::BlockPos;
use crate::inventory::{Inventory, ItemStack};
use crate::material::Material;
use crate::presence::OwnerId;
use crate::{MinionError, Result};

/// One persisted agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub owner: OwnerId,
    pub name: Option<String>,
    pub world: String,
    pub cell: BlockPos,
    pub facing: Compass,
    pub inventory: Inventory,
    pub avatar: AvatarKind,
}

impl AgentRecord {
    pub fn from_snapshot(snapshot: AgentSnapshot, name: Option<String>) -> Self {
        Self {
            owner: snapshot.owner,
            name,
            world: snapshot.world,
            cell: snapshot.position.block,
            facing: snapshot.facing,
            inventory: snapshot.inventory,
            avatar: snapshot.avatar,
        }
    }
}

/// Where agent state lives between runs.
pub trait StateStore: Send + Sync {
    /// Replace the stored state with `records`.
    fn save(&self, records: &[AgentRecord]) -> Result<()>;

    /// Read the stored state. `Ok(None)` means nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<AgentRecord>>>;
}

/// Protobuf file on the local disk.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    fn save(&self, records: &[AgentRecord]) -> Result<()> {
        let bytes = encode_state(records).encode_to_vec();
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        info!(target: "storage", path = %self.path.display(), agents = records.len(), "State saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<AgentRecord>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(target: "storage", path = %self.path.display(), "No saved state");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let state = minion_proto::PluginState::decode(bytes.as_slice())?;
        Ok(Some(decode_state(state)))
    }
}

/// Keeps the encoded state in memory. Used by tests and throwaway servers.
#[derive(Default)]
pub struct MemoryStateStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn save(&self, records: &[AgentRecord]) -> Result<()> {
        let bytes = encode_state(records).encode_to_vec();
        *self.bytes.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes);
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<AgentRecord>>> {
        let guard = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_deref() {
            Some(bytes) => {
                let state = minion_proto::PluginState::decode(bytes)?;
                Ok(Some(decode_state(state)))
            }
            None => Ok(None),
        }
    }
}

pub fn encode_state(records: &[AgentRecord]) -> minion_proto::PluginState {
    minion_proto::PluginState {
        robot_state: records.iter().map(encode_record).collect(),
        saved_at_ms: chrono::Utc::now().timestamp_millis(),
    }
}

/// Decode every usable record. Broken records are logged and skipped.
pub fn decode_state(state: minion_proto::PluginState) -> Vec<AgentRecord> {
    state
        .robot_state
        .into_iter()
        .filter_map(|robot| match decode_record(robot) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(target: "storage", error = %e, "Skipping unreadable agent record");
                None
            }
        })
        .collect()
}

fn encode_record(record: &AgentRecord) -> minion_proto::RobotState {
    minion_proto::RobotState {
        uuid: record.owner.to_string(),
        player_name: record.name.clone().unwrap_or_default(),
        world_name: record.world.clone(),
        robot_location: Some(minion_proto::Coordinate {
            x: record.cell.x,
            y: record.cell.y,
            z: record.cell.z,
        }),
        robot_direction: facing_to_wire(record.facing) as i32,
        robot_inventory: record
            .inventory
            .slots()
            .map(|(index, stack)| minion_proto::ItemStack {
                index: index as u32,
                material: Some(minion_proto::Material {
                    r#type: stack.material.id(),
                }),
                count: stack.count,
                data: vec![stack.data],
            })
            .collect(),
        avatar: record.avatar.as_str().to_string(),
    }
}

fn decode_record(robot: minion_proto::RobotState) -> Result<AgentRecord> {
    let owner: OwnerId = robot
        .uuid
        .parse()
        .map_err(|e| MinionError::StorageError(format!("bad owner id {:?}: {}", robot.uuid, e)))?;
    let location = robot
        .robot_location
        .ok_or_else(|| MinionError::StorageError(format!("agent {} has no location", owner)))?;
    let facing = facing_from_wire(robot.robot_direction).unwrap_or_else(|| {
        warn!(target: "storage", owner = %owner, direction = robot.robot_direction, "Bad stored facing, using SOUTH");
        Compass::default()
    });
    let avatar = robot.avatar.parse().unwrap_or_else(|e| {
        warn!(target: "storage", owner = %owner, error = %e, "Bad stored avatar, using default");
        AvatarKind::default()
    });

    let mut inventory = Inventory::new();
    for item in robot.robot_inventory {
        let id = item.material.map(|m| m.r#type).unwrap_or_default();
        let Some(material) = Material::from_id(id) else {
            warn!(target: "storage", owner = %owner, material = id, "Dropping unknown stored material");
            continue;
        };
        let data = item.data.first().copied().unwrap_or_default();
        let stack = ItemStack::with_data(material, item.count, data);
        if !inventory.set_slot(item.index as usize, Some(stack)) {
            warn!(target: "storage", owner = %owner, slot = item.index, "Dropping stack in invalid slot");
        }
    }

    Ok(AgentRecord {
        owner,
        name: Some(robot.player_name).filter(|n| !n.is_empty()),
        world: robot.world_name,
        cell: BlockPos::new(location.x, location.y, location.z),
        facing,
        inventory,
        avatar,
    })
}

fn facing_to_wire(facing: Compass) -> world_location::Direction {
    match facing {
        Compass::North => world_location::Direction::North,
        Compass::East => world_location::Direction::East,
        Compass::South => world_location::Direction::South,
        Compass::West => world_location::Direction::West,
    }
}

fn facing_from_wire(value: i32) -> Option<Compass> {
    match world_location::Direction::try_from(value).ok()? {
        world_location::Direction::North => Some(Compass::North),
        world_location::Direction::East => Some(Compass::East),
        world_location::Direction::South => Some(Compass::South),
        world_location::Direction::West => Some(Compass::West),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AgentRecord {
        let mut inventory = Inventory::new();
        inventory.set_slot(3, Some(ItemStack::with_data(Material::Log2, 12, 1)));
        inventory.set_slot(0, Some(ItemStack::new(Material::Cobblestone, 64)));
        AgentRecord {
            owner: OwnerId::new_v4(),
            name: Some("alice".to_string()),
            world: "world".to_string(),
            cell: BlockPos::new(-3, 64, 12),
            facing: Compass::West,
            inventory,
            avatar: AvatarKind::Hover,
        }
    }

    #[test]
    fn memory_store_keeps_slots_and_variant_data() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load().unwrap(), None);
        let saved = vec![record()];
        store.save(&saved).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));
    }

    #[test]
    fn broken_records_are_skipped() {
        let mut state = encode_state(&[record()]);
        let mut broken = state.robot_state[0].clone();
        broken.uuid = "not-a-uuid".to_string();
        state.robot_state.push(broken);
        let mut no_location = state.robot_state[0].clone();
        no_location.robot_location = None;
        state.robot_state.push(no_location);

        let decoded = decode_state(state);
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn unknown_facing_falls_back_to_south() {
        let mut state = encode_state(&[record()]);
        state.robot_state[0].robot_direction = world_location::Direction::Up as i32;
        let decoded = decode_state(state);
        assert_eq!(decoded[0].facing, Compass::South);
    }
}
