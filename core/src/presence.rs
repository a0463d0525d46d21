// Owner identity and live-presence collaborator
use crate::geometry::Position;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Stable identity of the player owning an agent. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub fn new_v4() -> Self {
        OwnerId(Uuid::new_v4())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OwnerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(OwnerId)
    }
}

/// A connected owner as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerPresence {
    pub id: OwnerId,
    pub name: String,
    pub world: String,
    pub position: Position,
}

/// Player presence and chat, provided by the host.
pub trait Presence: Send + Sync {
    /// The owner, if currently online.
    fn online_by_id(&self, id: OwnerId) -> Option<OwnerPresence>;

    /// Live lookup of an online player by display name.
    fn online_by_name(&self, name: &str) -> Option<OwnerPresence>;

    /// Private message to an online owner. Returns false when the owner is offline.
    fn send_message(&self, id: OwnerId, message: &str) -> bool;

    /// Message to every player.
    fn broadcast(&self, message: &str);
}

/// A chat line delivered through [`MemoryPresence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    /// `None` for broadcasts.
    pub to: Option<OwnerId>,
    pub text: String,
}

/// Chat lines kept by a [`MemoryPresence`] unless configured otherwise.
pub const CHAT_LOG_CAPACITY: usize = 256;

/// In-memory presence table used by the server binary and tests.
///
/// Chat is written to the `chat` tracing target; only the most recent
/// lines are kept for [`MemoryPresence::chat_log`].
pub struct MemoryPresence {
    online: DashMap<OwnerId, OwnerPresence>,
    chat: Mutex<VecDeque<ChatLine>>,
    chat_capacity: usize,
}

impl Default for MemoryPresence {
    fn default() -> Self {
        Self::with_chat_capacity(CHAT_LOG_CAPACITY)
    }
}

impl MemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat_capacity(capacity: usize) -> Self {
        Self {
            online: DashMap::new(),
            chat: Mutex::new(VecDeque::with_capacity(capacity)),
            chat_capacity: capacity,
        }
    }

    pub fn join(&self, owner: OwnerPresence) {
        self.online.insert(owner.id, owner);
    }

    pub fn leave(&self, id: OwnerId) {
        self.online.remove(&id);
    }

    /// The most recent chat lines, oldest first.
    pub fn chat_log(&self) -> Vec<ChatLine> {
        self.chat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn record(&self, line: ChatLine) {
        match line.to {
            Some(to) => info!(target: "chat", to = %to, text = %line.text, "Private message"),
            None => info!(target: "chat", text = %line.text, "Broadcast"),
        }
        if self.chat_capacity == 0 {
            return;
        }
        let mut chat = self
            .chat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while chat.len() >= self.chat_capacity {
            chat.pop_front();
        }
        chat.push_back(line);
    }
}

impl Presence for MemoryPresence {
    fn online_by_id(&self, id: OwnerId) -> Option<OwnerPresence> {
        self.online.get(&id).map(|e| e.value().clone())
    }

    fn online_by_name(&self, name: &str) -> Option<OwnerPresence> {
        self.online
            .iter()
            .find(|e| e.value().name == name)
            .map(|e| e.value().clone())
    }

    fn send_message(&self, id: OwnerId, message: &str) -> bool {
        if !self.online.contains_key(&id) {
            return false;
        }
        self.record(ChatLine {
            to: Some(id),
            text: message.to_string(),
        });
        true
    }

    fn broadcast(&self, message: &str) {
        self.record(ChatLine {
            to: None,
            text: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BlockPos;

    #[test]
    fn chat_log_keeps_only_recent_lines() {
        let presence = MemoryPresence::with_chat_capacity(3);
        for i in 0..10 {
            presence.broadcast(&format!("line {}", i));
        }
        let log = presence.chat_log();
        let texts: Vec<_> = log.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["line 7", "line 8", "line 9"]);
    }

    #[test]
    fn default_log_is_bounded() {
        let presence = MemoryPresence::new();
        for _ in 0..CHAT_LOG_CAPACITY * 2 {
            presence.broadcast("spam");
        }
        assert_eq!(presence.chat_log().len(), CHAT_LOG_CAPACITY);
    }

    #[test]
    fn private_messages_need_the_owner_online() {
        let presence = MemoryPresence::with_chat_capacity(0);
        let id = OwnerId::new_v4();
        assert!(!presence.send_message(id, "hi"));
        presence.join(OwnerPresence {
            id,
            name: "ann".into(),
            world: "world".into(),
            position: Position::anchored(BlockPos::new(0, 0, 0)),
        });
        assert!(presence.send_message(id, "hi"));
        assert!(presence.chat_log().is_empty());
    }
}
