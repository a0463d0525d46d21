use crate::direction::Compass;
use crate::geometry::BlockPos;
use crate::material::{Block, Material};
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How an agent shows up in the world.
///
/// Hooks are invoked on the tick thread after the agent's own state has been
/// updated. The agent state machine never depends on which variant is active.
pub trait Avatar: Send + Sync {
    fn kind(&self) -> AvatarKind;

    /// Material the avatar occupies its cell with, if any. Items of this material
    /// are never picked up by the agent.
    fn material(&self) -> Option<Material> {
        None
    }

    fn on_spawn(&mut self, world: &dyn World, cell: BlockPos, facing: Compass);

    fn on_move(&mut self, world: &dyn World, from: BlockPos, to: BlockPos, facing: Compass);

    fn on_turn(&mut self, world: &dyn World, cell: BlockPos, facing: Compass);

    /// Frequent upkeep: re-assert the visual state (facing etc.).
    fn on_tick(&mut self, _world: &dyn World, _cell: BlockPos, _facing: Compass) {}

    /// Less frequent upkeep for avatars that have to fight gravity.
    fn on_hover(&mut self, _world: &dyn World, _cell: BlockPos) {}

    fn on_teardown(&mut self, world: &dyn World, cell: BlockPos);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarKind {
    /// A pumpkin block occupying the agent's cell.
    #[default]
    Pumpkin,
    /// A floating marker that keeps its cell clear.
    Hover,
}

impl AvatarKind {
    pub fn build(self) -> Box<dyn Avatar> {
        match self {
            AvatarKind::Pumpkin => Box::new(BlockAvatar::new()),
            AvatarKind::Hover => Box::new(HoverAvatar),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AvatarKind::Pumpkin => "pumpkin",
            AvatarKind::Hover => "hover",
        }
    }
}

impl fmt::Display for AvatarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvatarKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "pumpkin" => Ok(AvatarKind::Pumpkin),
            "hover" => Ok(AvatarKind::Hover),
            other => Err(format!("unknown avatar kind: {}", other)),
        }
    }
}

/// Occupies the agent's cell with a pumpkin whose face points along the facing.
/// Remembers the block it displaced so it can be put back.
pub struct BlockAvatar {
    displaced: Block,
}

impl BlockAvatar {
    pub const MATERIAL: Material = Material::Pumpkin;

    pub fn new() -> Self {
        Self {
            displaced: Block::AIR,
        }
    }

    /// Orientation data byte for the pumpkin face.
    const fn facing_data(facing: Compass) -> u8 {
        match facing {
            Compass::South => 0x0,
            Compass::West => 0x1,
            Compass::North => 0x2,
            Compass::East => 0x3,
        }
    }

    fn occupy(&mut self, world: &dyn World, cell: BlockPos, facing: Compass) {
        let old = world.block_at(cell);
        // A pumpkin already there is a leftover of ours; don't preserve it.
        self.displaced = if old.material.matches(Self::MATERIAL) {
            Block::AIR
        } else {
            old
        };
        self.draw(world, cell, facing);
    }

    fn draw(&self, world: &dyn World, cell: BlockPos, facing: Compass) {
        world.set_block(
            cell,
            Block::new(Self::MATERIAL, Self::facing_data(facing)),
        );
    }
}

impl Default for BlockAvatar {
    fn default() -> Self {
        Self::new()
    }
}

impl Avatar for BlockAvatar {
    fn kind(&self) -> AvatarKind {
        AvatarKind::Pumpkin
    }

    fn material(&self) -> Option<Material> {
        Some(Self::MATERIAL)
    }

    fn on_spawn(&mut self, world: &dyn World, cell: BlockPos, facing: Compass) {
        self.occupy(world, cell, facing);
    }

    fn on_move(&mut self, world: &dyn World, from: BlockPos, to: BlockPos, facing: Compass) {
        world.set_block(from, self.displaced);
        self.occupy(world, to, facing);
    }

    fn on_turn(&mut self, world: &dyn World, cell: BlockPos, facing: Compass) {
        self.draw(world, cell, facing);
    }

    fn on_tick(&mut self, world: &dyn World, cell: BlockPos, facing: Compass) {
        self.draw(world, cell, facing);
    }

    fn on_teardown(&mut self, world: &dyn World, cell: BlockPos) {
        world.set_block(cell, self.displaced);
    }
}

/// A floating marker. It has no block of its own but keeps its cell free of
/// anything solid so it can't get stuck.
pub struct HoverAvatar;

impl Avatar for HoverAvatar {
    fn kind(&self) -> AvatarKind {
        AvatarKind::Hover
    }

    fn on_spawn(&mut self, world: &dyn World, cell: BlockPos, _facing: Compass) {
        self.on_hover(world, cell);
    }

    fn on_move(&mut self, _world: &dyn World, _from: BlockPos, _to: BlockPos, _facing: Compass) {}

    fn on_turn(&mut self, _world: &dyn World, _cell: BlockPos, _facing: Compass) {}

    fn on_hover(&mut self, world: &dyn World, cell: BlockPos) {
        let block = world.block_at(cell);
        if !block.is_empty() && !block.material.is_liquid() {
            world.set_block(cell, Block::AIR);
        }
    }

    fn on_teardown(&mut self, _world: &dyn World, _cell: BlockPos) {}
}
