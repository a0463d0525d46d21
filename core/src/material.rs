// World materials and their equivalence rules
use serde::{Deserialize, Serialize};
use std::fmt;

/// A block or item kind. Discriminants follow the classic numeric block ids,
/// which is also what the wire protocol carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Air = 0,
    Stone = 1,
    Grass = 2,
    Dirt = 3,
    Cobblestone = 4,
    Wood = 5,
    Sapling = 6,
    Bedrock = 7,
    Water = 8,
    StationaryWater = 9,
    Lava = 10,
    StationaryLava = 11,
    Sand = 12,
    Gravel = 13,
    GoldOre = 14,
    IronOre = 15,
    CoalOre = 16,
    Log = 17,
    Leaves = 18,
    Glass = 20,
    Torch = 50,
    Chest = 54,
    DiamondOre = 56,
    CraftingTable = 58,
    Pumpkin = 86,
    JackOLantern = 91,
    Leaves2 = 161,
    Log2 = 162,
}

impl Material {
    pub const ALL: [Material; 28] = [
        Material::Air,
        Material::Stone,
        Material::Grass,
        Material::Dirt,
        Material::Cobblestone,
        Material::Wood,
        Material::Sapling,
        Material::Bedrock,
        Material::Water,
        Material::StationaryWater,
        Material::Lava,
        Material::StationaryLava,
        Material::Sand,
        Material::Gravel,
        Material::GoldOre,
        Material::IronOre,
        Material::CoalOre,
        Material::Log,
        Material::Leaves,
        Material::Glass,
        Material::Torch,
        Material::Chest,
        Material::DiamondOre,
        Material::CraftingTable,
        Material::Pumpkin,
        Material::JackOLantern,
        Material::Leaves2,
        Material::Log2,
    ];

    pub const fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Material> {
        Material::ALL.iter().copied().find(|m| m.id() == id)
    }

    /// Whether the cell blocks movement and placement.
    pub const fn is_solid(self) -> bool {
        !matches!(
            self,
            Material::Air
                | Material::Sapling
                | Material::Water
                | Material::StationaryWater
                | Material::Lava
                | Material::StationaryLava
                | Material::Torch
        )
    }

    pub const fn is_liquid(self) -> bool {
        matches!(
            self,
            Material::Water | Material::StationaryWater | Material::Lava | Material::StationaryLava
        )
    }

    /// The logical material this one belongs to. Variants that only differ in
    /// orientation or flow state share a canonical kind.
    pub const fn canonical(self) -> Material {
        match self {
            Material::Log2 => Material::Log,
            Material::Leaves2 => Material::Leaves,
            Material::StationaryWater => Material::Water,
            Material::StationaryLava => Material::Lava,
            Material::JackOLantern => Material::Pumpkin,
            other => other,
        }
    }

    /// Equality under the equivalence classes above (e.g. both log variants match).
    pub fn matches(self, other: Material) -> bool {
        self.canonical() == other.canonical()
    }

    /// Whether a broken block of this kind can leave anything behind.
    pub const fn is_breakable(self) -> bool {
        !matches!(self, Material::Air | Material::Bedrock) && !self.is_liquid()
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A world cell: its material plus the variant data byte (orientation etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub material: Material,
    pub data: u8,
}

impl Block {
    pub const AIR: Block = Block {
        material: Material::Air,
        data: 0,
    };

    pub const fn new(material: Material, data: u8) -> Self {
        Self { material, data }
    }

    pub const fn of(material: Material) -> Self {
        Self { material, data: 0 }
    }

    pub const fn is_solid(&self) -> bool {
        self.material.is_solid()
    }

    pub fn is_empty(&self) -> bool {
        self.material == Material::Air
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::AIR
    }
}

/// What an agent mines with. The world consults it when deciding what a broken
/// block leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Hand,
    WoodenPickaxe,
    StonePickaxe,
    IronPickaxe,
    #[default]
    DiamondPickaxe,
}

impl Tool {
    /// Whether mining `material` with this tool yields an item.
    pub fn can_harvest(self, material: Material) -> bool {
        match material {
            Material::Stone | Material::Cobblestone | Material::CoalOre => self != Tool::Hand,
            Material::IronOre => matches!(
                self,
                Tool::StonePickaxe | Tool::IronPickaxe | Tool::DiamondPickaxe
            ),
            Material::GoldOre | Material::DiamondOre => {
                matches!(self, Tool::IronPickaxe | Tool::DiamondPickaxe)
            }
            _ => true,
        }
    }
}
