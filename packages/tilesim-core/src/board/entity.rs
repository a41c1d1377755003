//! Entities stored on the board.

use serde::{Deserialize, Serialize};

use super::Pos;

/// Arena handle of an entity. Never reused once torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub(crate) u64);

impl EntityId {
    /// Get the raw ID value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an entity is. Resolved once at spawn, checked by capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// Drawable content, identified by sprite name
    Sprite(String),
    /// Participant that owns claims, aggregators and guards
    Actor(String),
    /// Ephemeral claim marker. Invisible to everything except other claims.
    ClaimToken { valid: bool },
}

impl EntityKind {
    pub fn is_claim_token(&self) -> bool {
        matches!(self, EntityKind::ClaimToken { .. })
    }

    pub fn is_drawable(&self) -> bool {
        matches!(self, EntityKind::Sprite(_))
    }

    /// Sprite name, if this is drawable content.
    pub fn sprite(&self) -> Option<&str> {
        match self {
            EntityKind::Sprite(name) => Some(name),
            _ => None,
        }
    }
}

/// Arena record for a live entity.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) kind: EntityKind,
    pub(crate) pos: Option<Pos>,
}

impl Entity {
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Tile the entity sits on, `None` while unplaced.
    pub fn pos(&self) -> Option<Pos> {
        self.pos
    }
}
