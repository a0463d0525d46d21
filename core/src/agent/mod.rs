//! Agent model split into smaller files for readability.
//! - avatar.rs: Avatar trait and the visual variants
//! - instance.rs: Agent struct and its actions (move, turn, mine, place, ...)
//! - scan.rs: Manhattan-radius spatial scans

mod avatar;
mod instance;
pub mod scan;

pub use avatar::{Avatar, AvatarKind, BlockAvatar, HoverAvatar};
pub use instance::{Agent, AgentSnapshot, VISIBILITY_RANGE};
pub use scan::ScanFilter;
