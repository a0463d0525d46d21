use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::avatar::{Avatar, AvatarKind};
use super::scan::{
    self, ScanFilter, MATERIAL_SCAN_LIMIT, MATERIAL_SCAN_RADIUS, NON_SOLID_SCAN_LIMIT,
    NON_SOLID_SCAN_RADIUS,
};
use crate::direction::{resolve, AbsoluteDirection, Compass, Direction};
use crate::geometry::{BlockPos, Position};
use crate::inventory::{Inventory, ItemStack};
use crate::material::{Block, Material, Tool};
use crate::presence::{OwnerId, Presence};
use crate::world::World;

/// Cells further than this (straight-line) are not visible to an agent.
pub const VISIBILITY_RANGE: f64 = 10.0;

/// A robot living in a world.
///
/// All mutating methods must be called from the tick thread. Every method that
/// takes a [`Direction`] resolves it against the facing at call time.
pub struct Agent {
    owner: OwnerId,
    world: Arc<dyn World>,
    position: Position,
    facing: Compass,
    inventory: Inventory,
    tool: Tool,
    avatar: Box<dyn Avatar>,
}

/// Plain-data copy of an agent's state, e.g. for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub owner: OwnerId,
    pub world: String,
    pub position: Position,
    pub facing: Compass,
    pub inventory: Inventory,
    pub avatar: AvatarKind,
}

impl Agent {
    /// Create an agent in `cell`, facing SOUTH, and let the avatar appear.
    pub fn spawn(owner: OwnerId, world: Arc<dyn World>, cell: BlockPos, avatar: AvatarKind) -> Self {
        let mut agent = Self {
            owner,
            world,
            position: Position::anchored(cell),
            facing: Compass::default(),
            inventory: Inventory::new(),
            tool: Tool::default(),
            avatar: avatar.build(),
        };
        agent
            .avatar
            .on_spawn(agent.world.as_ref(), cell, agent.facing);
        info!(target: "agent", owner = %owner, world = %agent.world.name(), %cell, avatar = %avatar, "Agent spawned");
        agent
    }

    /// Re-create an agent from persisted state.
    pub fn restore(
        owner: OwnerId,
        world: Arc<dyn World>,
        cell: BlockPos,
        facing: Compass,
        inventory: Inventory,
        avatar: AvatarKind,
    ) -> Self {
        let mut agent = Self::spawn(owner, world, cell, avatar);
        agent.turn(Direction::Absolute(facing.into()));
        agent.inventory = inventory;
        agent
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tool = tool;
        self
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn world(&self) -> &dyn World {
        self.world.as_ref()
    }

    pub fn world_name(&self) -> &str {
        self.world.name()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn cell(&self) -> BlockPos {
        self.position.block
    }

    pub fn facing(&self) -> Compass {
        self.facing
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn avatar_kind(&self) -> AvatarKind {
        self.avatar.kind()
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            owner: self.owner,
            world: self.world.name().to_string(),
            position: self.position,
            facing: self.facing,
            inventory: self.inventory.clone(),
            avatar: self.avatar.kind(),
        }
    }

    /// The neighbouring cell in `direction`, if the coordinate space has one.
    pub fn target_cell(&self, direction: Direction) -> Option<BlockPos> {
        self.cell().checked_add(self.resolve(direction).unit_vector())
    }

    pub fn block_in(&self, direction: Direction) -> Option<Block> {
        self.target_cell(direction).map(|pos| self.world.block_at(pos))
    }

    fn resolve(&self, direction: Direction) -> AbsoluteDirection {
        resolve(self.facing, direction)
    }

    /// Step one cell. Fails without moving when the destination is solid.
    pub fn move_in(&mut self, direction: Direction) -> bool {
        let vector = self.resolve(direction).unit_vector();
        let from = self.cell();
        let Some(position) = self.position.translated(vector) else {
            debug!(target: "agent", owner = %self.owner, %from, "Move off the edge of the world");
            return false;
        };
        let to = position.block;
        if self.world.is_solid(to) {
            debug!(target: "agent", owner = %self.owner, %to, "Move blocked");
            return false;
        }
        self.position = position;
        self.avatar
            .on_move(self.world.as_ref(), from, to, self.facing);
        true
    }

    /// Face a compass point. Fails (facing unchanged) for UP and DOWN.
    pub fn turn(&mut self, direction: Direction) -> bool {
        match self.resolve(direction).as_compass() {
            Some(facing) => {
                self.facing = facing;
                self.avatar
                    .on_turn(self.world.as_ref(), self.cell(), facing);
                true
            }
            None => false,
        }
    }

    /// Break the neighbouring block; whatever it drops goes into the inventory.
    pub fn mine(&mut self, direction: Direction) -> bool {
        let Some(target) = self.target_cell(direction) else {
            return false;
        };
        let material = self.world.block_at(target).material;
        let Some(drops) = self.world.break_block(target, self.tool) else {
            debug!(target: "agent", owner = %self.owner, %target, %material, "Nothing to mine");
            return false;
        };
        info!(target: "agent", owner = %self.owner, %target, %material, "Mined block");
        for stack in drops {
            self.pick_up(stack);
        }
        true
    }

    /// Place one unit of `material` from the inventory into the neighbouring cell.
    /// Fails without side effects if the cell is solid or nothing is in stock.
    pub fn place(&mut self, direction: Direction, material: Material) -> bool {
        let Some(target) = self.target_cell(direction) else {
            return false;
        };
        if self.world.is_solid(target) || !self.inventory.contains(material) {
            return false;
        }
        let Some(data) = self.inventory.remove_one(material) else {
            return false;
        };
        self.world.set_block(target, Block::new(material, data));
        true
    }

    /// Collect an item. Returns false if it was ignored.
    pub fn pick_up(&mut self, stack: ItemStack) -> bool {
        // Never collect our own avatar block.
        if self.avatar.material() == Some(stack.material) {
            return false;
        }
        let leftover = self.inventory.add(stack);
        if leftover > 0 {
            warn!(target: "agent", owner = %self.owner, material = %stack.material, leftover, "Inventory full");
        }
        debug!(target: "agent", owner = %self.owner, material = %stack.material, count = stack.count, "Picked up item");
        leftover < stack.count
    }

    pub fn scan(&self, filter: ScanFilter, max_distance: u32, limit: usize) -> Vec<BlockPos> {
        scan::scan(self.world.as_ref(), self.cell(), filter, max_distance, limit)
    }

    /// Empty cells right next to the agent.
    pub fn scan_non_solid(&self) -> Vec<BlockPos> {
        self.scan(ScanFilter::NonSolid, NON_SOLID_SCAN_RADIUS, NON_SOLID_SCAN_LIMIT)
    }

    pub fn scan_material(&self, material: Material) -> Vec<BlockPos> {
        self.scan(
            ScanFilter::Material(material),
            MATERIAL_SCAN_RADIUS,
            MATERIAL_SCAN_LIMIT,
        )
    }

    /// Crude line of sight: same world and within [`VISIBILITY_RANGE`].
    /// Does not check for anything in between.
    pub fn is_visible(&self, world: &str, pos: BlockPos) -> bool {
        world == self.world.name() && pos.distance(self.cell()) <= VISIBILITY_RANGE
    }

    /// Jump to an absolute cell. Fails if the cell is solid.
    pub fn teleport(&mut self, to: BlockPos) -> bool {
        if self.world.is_solid(to) {
            warn!(target: "agent", owner = %self.owner, %to, "Teleport blocked");
            return false;
        }
        let from = self.cell();
        self.position = Position::anchored(to);
        self.avatar
            .on_move(self.world.as_ref(), from, to, self.facing);
        info!(target: "agent", owner = %self.owner, %from, %to, "Teleported");
        true
    }

    /// Private chat to the owner; fails when the owner is offline.
    pub fn message_owner(&self, presence: &dyn Presence, text: &str) -> bool {
        presence.send_message(self.owner, &format!("[My Robot -> Me] {}", text))
    }

    /// Public chat, regardless of whether the owner is online.
    pub fn message_all(&self, presence: &dyn Presence, owner_name: &str, text: &str) -> bool {
        presence.broadcast(&format!("<{}'s Robot> {}", owner_name, text));
        true
    }

    /// Frequent upkeep: keep the avatar's visual state in sync.
    pub fn upkeep(&mut self) {
        self.avatar
            .on_tick(self.world.as_ref(), self.cell(), self.facing);
    }

    pub fn hover_upkeep(&mut self) {
        self.avatar.on_hover(self.world.as_ref(), self.cell());
    }

    /// Remove the avatar from the world. Called once before the agent is dropped.
    pub fn teardown(&mut self) {
        self.avatar.on_teardown(self.world.as_ref(), self.cell());
        info!(target: "agent", owner = %self.owner, "Agent torn down");
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("owner", &self.owner)
            .field("world", &self.world.name())
            .field("position", &self.position)
            .field("facing", &self.facing)
            .field("avatar", &self.avatar.kind())
            .finish()
    }
}
