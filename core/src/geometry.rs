// Block coordinates and agent positions
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer coordinate of a single world cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The cell `v` away, or `None` past the edge of the coordinate space.
    pub fn checked_add(self, v: [i32; 3]) -> Option<Self> {
        Some(Self::new(
            self.x.checked_add(v[0])?,
            self.y.checked_add(v[1])?,
            self.z.checked_add(v[2])?,
        ))
    }

    pub fn manhattan(self, other: BlockPos) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
            .saturating_add(self.z.abs_diff(other.z))
    }

    /// Straight-line distance between the two cell corners.
    pub fn distance(self, other: BlockPos) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Sub-block offset used when an agent is placed in a cell: centred on x/z and
/// resting just below the top of the cell.
pub const CELL_ANCHOR: [f64; 3] = [0.5, 0.99, 0.5];

/// An agent position: the owning cell plus where inside the cell the avatar sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub block: BlockPos,
    pub offset: [f64; 3],
}

impl Position {
    /// Position anchored inside `block` at [`CELL_ANCHOR`].
    pub fn anchored(block: BlockPos) -> Self {
        Self {
            block,
            offset: CELL_ANCHOR,
        }
    }

    /// Translate by whole cells, keeping the sub-block offset.
    pub fn translated(self, v: [i32; 3]) -> Option<Self> {
        Some(Self {
            block: self.block.checked_add(v)?,
            offset: self.offset,
        })
    }

    pub fn coords(&self) -> [f64; 3] {
        [
            f64::from(self.block.x) + self.offset[0],
            f64::from(self.block.y) + self.offset[1],
            f64::from(self.block.z) + self.offset[2],
        ]
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let a = self.coords();
        let b = other.coords();
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
    }
}
