//! World collaborator.
//!
//! The simulation engine owns the real world; the core only needs a handful of
//! cell primitives, expressed by [`World`]. [`MemoryWorld`] is a self-contained
//! implementation used by the server binary and the tests.

use crate::geometry::BlockPos;
use crate::inventory::ItemStack;
use crate::material::{Block, Material, Tool};
use crate::{MinionError, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Cell primitives consumed from the host engine.
///
/// Mutating calls must only be made from the tick thread; queries may come from
/// any thread.
pub trait World: Send + Sync {
    fn name(&self) -> &str;

    fn block_at(&self, pos: BlockPos) -> Block;

    fn set_block(&self, pos: BlockPos, block: Block);

    /// Break the block at `pos` as if mined with `tool`.
    ///
    /// Returns `None` when there was nothing breakable, otherwise the collectible
    /// items the block left behind (possibly none).
    fn break_block(&self, pos: BlockPos, tool: Tool) -> Option<Vec<ItemStack>>;

    fn is_solid(&self, pos: BlockPos) -> bool {
        self.block_at(pos).is_solid()
    }
}

/// Terrain generator for cells that were never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terrain {
    /// Every cell is air.
    Void,
    /// Bedrock at y=0, stone up to `ground - 1`, grass at `ground`, air above.
    Flat { ground: i32 },
}

/// In-memory world backed by a concurrent cell map.
pub struct MemoryWorld {
    name: String,
    terrain: Terrain,
    cells: DashMap<BlockPos, Block>,
}

impl MemoryWorld {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_terrain(name, Terrain::Void)
    }

    pub fn flat(name: impl Into<String>, ground: i32) -> Self {
        Self::with_terrain(name, Terrain::Flat { ground })
    }

    pub fn with_terrain(name: impl Into<String>, terrain: Terrain) -> Self {
        Self {
            name: name.into(),
            terrain,
            cells: DashMap::new(),
        }
    }

    fn generated(&self, pos: BlockPos) -> Block {
        match self.terrain {
            Terrain::Void => Block::AIR,
            Terrain::Flat { ground } => {
                if pos.y < 0 || pos.y > ground {
                    Block::AIR
                } else if pos.y == 0 {
                    Block::of(Material::Bedrock)
                } else if pos.y == ground {
                    Block::of(Material::Grass)
                } else {
                    Block::of(Material::Stone)
                }
            }
        }
    }

    /// Drops for a harvested block.
    fn drops_for(block: Block, tool: Tool) -> Vec<ItemStack> {
        if !tool.can_harvest(block.material) {
            return Vec::new();
        }
        match block.material {
            Material::Stone => vec![ItemStack::new(Material::Cobblestone, 1)],
            Material::Grass => vec![ItemStack::new(Material::Dirt, 1)],
            Material::Leaves | Material::Leaves2 | Material::Glass => Vec::new(),
            other => vec![ItemStack::with_data(other, 1, block.data)],
        }
    }
}

impl World for MemoryWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_at(&self, pos: BlockPos) -> Block {
        self.cells
            .get(&pos)
            .map(|b| *b.value())
            .unwrap_or_else(|| self.generated(pos))
    }

    fn set_block(&self, pos: BlockPos, block: Block) {
        self.cells.insert(pos, block);
    }

    fn break_block(&self, pos: BlockPos, tool: Tool) -> Option<Vec<ItemStack>> {
        let block = self.block_at(pos);
        if !block.material.is_breakable() {
            return None;
        }
        self.cells.insert(pos, Block::AIR);
        debug!(target: "world", world = %self.name, %pos, material = %block.material, "Block broken");
        Some(Self::drops_for(block, tool))
    }
}

/// All worlds known to the server, addressed by name.
#[derive(Clone, Default)]
pub struct WorldDirectory {
    worlds: HashMap<String, Arc<dyn World>>,
    default_world: Option<String>,
}

impl WorldDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a world. The first one registered becomes the default.
    pub fn insert(&mut self, world: Arc<dyn World>) {
        let name = world.name().to_string();
        if self.default_world.is_none() {
            self.default_world = Some(name.clone());
        }
        self.worlds.insert(name, world);
    }

    pub fn with(mut self, world: Arc<dyn World>) -> Self {
        self.insert(world);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn World>> {
        self.worlds
            .get(name)
            .cloned()
            .ok_or_else(|| MinionError::UnknownWorld(name.to_string()))
    }

    pub fn default_world(&self) -> Result<Arc<dyn World>> {
        let name = self
            .default_world
            .as_deref()
            .ok_or_else(|| MinionError::UnknownWorld("<default>".to_string()))?;
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_terrain_layers() {
        let w = MemoryWorld::flat("w", 4);
        assert_eq!(w.block_at(BlockPos::new(0, 0, 0)).material, Material::Bedrock);
        assert_eq!(w.block_at(BlockPos::new(0, 2, 0)).material, Material::Stone);
        assert_eq!(w.block_at(BlockPos::new(0, 4, 0)).material, Material::Grass);
        assert!(w.block_at(BlockPos::new(0, 5, 0)).is_empty());
    }

    #[test]
    fn breaking_stone_drops_cobblestone() {
        let w = MemoryWorld::flat("w", 4);
        let drops = w.break_block(BlockPos::new(0, 2, 0), Tool::DiamondPickaxe).unwrap();
        assert_eq!(drops, vec![ItemStack::new(Material::Cobblestone, 1)]);
        assert!(w.block_at(BlockPos::new(0, 2, 0)).is_empty());
    }

    #[test]
    fn air_and_bedrock_cannot_be_broken() {
        let w = MemoryWorld::flat("w", 4);
        assert!(w.break_block(BlockPos::new(0, 9, 0), Tool::DiamondPickaxe).is_none());
        assert!(w.break_block(BlockPos::new(0, 0, 0), Tool::DiamondPickaxe).is_none());
    }

    #[test]
    fn first_world_is_default() {
        let dir = WorldDirectory::new()
            .with(Arc::new(MemoryWorld::new("overworld")))
            .with(Arc::new(MemoryWorld::new("nether")));
        assert_eq!(dir.default_world().unwrap().name(), "overworld");
        assert!(dir.get("end").is_err());
    }
}
