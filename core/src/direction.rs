//! Directions an agent can face, move, and target.
//!
//! A requested [`Direction`] is either absolute (a compass point or UP/DOWN) or
//! relative to the agent's current facing. Relative directions are resolved at the
//! moment of use with [`resolve`] and are never stored. Facing itself is a
//! [`Compass`] value, so an agent can never face UP or DOWN.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four horizontal compass points an agent may face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Compass {
    North,
    East,
    #[default]
    South,
    West,
}

/// Compass points in clockwise order.
pub const COMPASS: [Compass; 4] = [Compass::North, Compass::East, Compass::South, Compass::West];

impl Compass {
    /// Position of this point in [`COMPASS`].
    pub const fn index(self) -> usize {
        match self {
            Compass::North => 0,
            Compass::East => 1,
            Compass::South => 2,
            Compass::West => 3,
        }
    }

    /// Rotate clockwise by `steps` compass points.
    pub const fn rotated(self, steps: usize) -> Compass {
        COMPASS[(self.index() + steps) % COMPASS.len()]
    }

    /// Avatar yaw in degrees, measured from SOUTH.
    pub const fn yaw(self) -> f32 {
        match self {
            Compass::South => 0.0,
            Compass::West => 90.0,
            Compass::North => 180.0,
            Compass::East => 270.0,
        }
    }
}

/// A direction in world terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbsoluteDirection {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl AbsoluteDirection {
    pub const ALL: [AbsoluteDirection; 6] = [
        AbsoluteDirection::North,
        AbsoluteDirection::East,
        AbsoluteDirection::South,
        AbsoluteDirection::West,
        AbsoluteDirection::Up,
        AbsoluteDirection::Down,
    ];

    /// Unit displacement `[x, y, z]` for one step in this direction.
    pub const fn unit_vector(self) -> [i32; 3] {
        match self {
            AbsoluteDirection::Up => [0, 1, 0],
            AbsoluteDirection::Down => [0, -1, 0],
            AbsoluteDirection::North => [0, 0, -1],
            AbsoluteDirection::South => [0, 0, 1],
            AbsoluteDirection::East => [1, 0, 0],
            AbsoluteDirection::West => [-1, 0, 0],
        }
    }

    /// The compass point, or `None` for UP/DOWN.
    pub const fn as_compass(self) -> Option<Compass> {
        match self {
            AbsoluteDirection::North => Some(Compass::North),
            AbsoluteDirection::East => Some(Compass::East),
            AbsoluteDirection::South => Some(Compass::South),
            AbsoluteDirection::West => Some(Compass::West),
            AbsoluteDirection::Up | AbsoluteDirection::Down => None,
        }
    }
}

impl From<Compass> for AbsoluteDirection {
    fn from(c: Compass) -> Self {
        match c {
            Compass::North => AbsoluteDirection::North,
            Compass::East => AbsoluteDirection::East,
            Compass::South => AbsoluteDirection::South,
            Compass::West => AbsoluteDirection::West,
        }
    }
}

/// A direction relative to the current facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativeDirection {
    Forward,
    Right,
    Backward,
    Left,
}

impl RelativeDirection {
    pub const ALL: [RelativeDirection; 4] = [
        RelativeDirection::Forward,
        RelativeDirection::Right,
        RelativeDirection::Backward,
        RelativeDirection::Left,
    ];

    /// Clockwise compass steps from the facing direction.
    pub const fn rotation(self) -> usize {
        match self {
            RelativeDirection::Forward => 0,
            RelativeDirection::Right => 1,
            RelativeDirection::Backward => 2,
            RelativeDirection::Left => 3,
        }
    }
}

/// A requested direction, as it arrives from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Absolute(AbsoluteDirection),
    Relative(RelativeDirection),
}

impl Direction {
    pub const FORWARD: Direction = Direction::Relative(RelativeDirection::Forward);
    pub const BACKWARD: Direction = Direction::Relative(RelativeDirection::Backward);
    pub const LEFT: Direction = Direction::Relative(RelativeDirection::Left);
    pub const RIGHT: Direction = Direction::Relative(RelativeDirection::Right);
    pub const NORTH: Direction = Direction::Absolute(AbsoluteDirection::North);
    pub const EAST: Direction = Direction::Absolute(AbsoluteDirection::East);
    pub const SOUTH: Direction = Direction::Absolute(AbsoluteDirection::South);
    pub const WEST: Direction = Direction::Absolute(AbsoluteDirection::West);
    pub const UP: Direction = Direction::Absolute(AbsoluteDirection::Up);
    pub const DOWN: Direction = Direction::Absolute(AbsoluteDirection::Down);
}

impl From<AbsoluteDirection> for Direction {
    fn from(d: AbsoluteDirection) -> Self {
        Direction::Absolute(d)
    }
}

impl From<RelativeDirection> for Direction {
    fn from(d: RelativeDirection) -> Self {
        Direction::Relative(d)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Absolute(d) => write!(f, "{:?}", d),
            Direction::Relative(d) => write!(f, "{:?}", d),
        }
    }
}

/// Resolve a requested direction against the current facing.
pub const fn resolve(facing: Compass, requested: Direction) -> AbsoluteDirection {
    match requested {
        Direction::Absolute(d) => d,
        Direction::Relative(r) => match facing.rotated(r.rotation()) {
            Compass::North => AbsoluteDirection::North,
            Compass::East => AbsoluteDirection::East,
            Compass::South => AbsoluteDirection::South,
            Compass::West => AbsoluteDirection::West,
        },
    }
}
