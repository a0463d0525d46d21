//! Shared protobuf types for the Minions robot API (package `minions.v1`).
//!
//! The same package carries the wire messages (`RobotRequest`/`RobotResponse`)
//! and the persisted state (`PluginState`).

include!(concat!(env!("OUT_DIR"), concat!("/", "minions.v1", ".rs")));

pub use prost::Message;
