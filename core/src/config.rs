use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::agent::AvatarKind;
use crate::geometry::BlockPos;
use crate::presence::OwnerId;
use crate::{MinionError, Result};

pub const DEFAULT_PORT: u16 = 26656;
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Server configuration
#[derive(Clone, Debug)]
pub struct MinionConfig {
    pub bind_addr: SocketAddr,
    pub ticks_per_second: u32,
    /// Queue drain cadence, in ticks.
    pub action_interval_ticks: u64,
    pub facing_upkeep_interval_ticks: u64,
    pub hover_upkeep_interval_ticks: u64,
    /// 0 disables autosave; state is still written at shutdown.
    pub autosave_interval_ticks: u64,
    pub state_path: PathBuf,
    pub max_frame_len: usize,
    /// Reply with an explicit failure when a queued action's agent is gone.
    pub late_failure_replies: bool,
    pub log_level: String,
    pub default_world: String,
    /// Ground height of the generated flat worlds.
    pub ground_level: i32,
    /// Agents created at startup unless already restored from saved state.
    pub spawn: Vec<SpawnEntry>,
}

/// One agent to create at startup.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SpawnEntry {
    pub owner: OwnerId,
    pub name: Option<String>,
    pub world: Option<String>,
    pub position: [i32; 3],
    #[serde(default)]
    pub avatar: AvatarKind,
}

impl SpawnEntry {
    pub fn cell(&self) -> BlockPos {
        let [x, y, z] = self.position;
        BlockPos::new(x, y, z)
    }
}

impl Default for MinionConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("MINION_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))),
            ticks_per_second: 20,
            action_interval_ticks: 1,
            facing_upkeep_interval_ticks: 2,
            hover_upkeep_interval_ticks: 10,
            autosave_interval_ticks: 6000,
            state_path: std::env::var("MINION_STATE_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("minions-state.pb")),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            late_failure_replies: false,
            log_level: std::env::var("MINION_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            default_world: "world".to_string(),
            ground_level: 63,
            spawn: Vec::new(),
        }
    }
}

impl MinionConfig {
    /// Load configuration from a TOML file (path via MINION_CONFIG or ./minions.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("MINION_CONFIG").unwrap_or_else(|_| "minions.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "config", path = %path, "No TOML config found; using defaults/env");
            return Self::default();
        }
        match Self::load_from(p) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to load TOML; using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let overlay: MinionToml =
            toml::from_str(s).map_err(|e| MinionError::ConfigError(e.to_string()))?;
        overlay.overlay(Self::default()).validated()
    }

    fn validated(self) -> Result<Self> {
        if self.ticks_per_second == 0 {
            return Err(MinionError::ConfigError(
                "ticks_per_second must be positive".into(),
            ));
        }
        if self.action_interval_ticks == 0 {
            return Err(MinionError::ConfigError(
                "action_interval_ticks must be positive".into(),
            ));
        }
        Ok(self)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.ticks_per_second.max(1)
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MinionToml {
    pub bind_addr: Option<SocketAddr>,
    pub ticks_per_second: Option<u32>,
    pub action_interval_ticks: Option<u64>,
    pub facing_upkeep_interval_ticks: Option<u64>,
    pub hover_upkeep_interval_ticks: Option<u64>,
    pub autosave_interval_ticks: Option<u64>,
    pub state_path: Option<PathBuf>,
    pub max_frame_len: Option<usize>,
    pub late_failure_replies: Option<bool>,
    pub log_level: Option<String>,
    pub default_world: Option<String>,
    pub ground_level: Option<i32>,
    #[serde(default)]
    pub spawn: Vec<SpawnEntry>,
}

impl MinionToml {
    fn overlay(self, mut base: MinionConfig) -> MinionConfig {
        if let Some(v) = self.bind_addr {
            base.bind_addr = v;
        }
        if let Some(v) = self.ticks_per_second {
            base.ticks_per_second = v;
        }
        if let Some(v) = self.action_interval_ticks {
            base.action_interval_ticks = v;
        }
        if let Some(v) = self.facing_upkeep_interval_ticks {
            base.facing_upkeep_interval_ticks = v;
        }
        if let Some(v) = self.hover_upkeep_interval_ticks {
            base.hover_upkeep_interval_ticks = v;
        }
        if let Some(v) = self.autosave_interval_ticks {
            base.autosave_interval_ticks = v;
        }
        if let Some(v) = self.state_path {
            base.state_path = v;
        }
        if let Some(v) = self.max_frame_len {
            base.max_frame_len = v;
        }
        if let Some(v) = self.late_failure_replies {
            base.late_failure_replies = v;
        }
        if let Some(v) = self.log_level {
            base.log_level = v;
        }
        if let Some(v) = self.default_world {
            base.default_world = v;
        }
        if let Some(v) = self.ground_level {
            base.ground_level = v;
        }
        base.spawn.extend(self.spawn);
        base
    }
}
