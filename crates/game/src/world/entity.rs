use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

pub const PLAYER_PREFIX: &str = "player_";
pub const BALL_PREFIX: &str = "ball_";

/// Stable identifier of a replicated entity.
///
/// Unique among live entities. The prefix names the entity class so a peer
/// can infer the kind of an identifier it has never seen before.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn player(index: u32) -> Self {
        Self(format!("{PLAYER_PREFIX}{index}"))
    }

    pub fn ball(index: u32) -> Self {
        Self(format!("{BALL_PREFIX}{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kind(&self) -> EntityKind {
        EntityKind::infer(&self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EntityKind {
    Player,
    Ball,
    /// Transform-only object with no behaviour of its own.
    #[default]
    Prop,
}

impl EntityKind {
    pub fn infer(id: &str) -> Self {
        if id.starts_with(PLAYER_PREFIX) {
            Self::Player
        } else if id.starts_with(BALL_PREFIX) {
            Self::Ball
        } else {
            Self::Prop
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prop {
    pub id: EntityId,
    pub transform: Transform,
}

impl Prop {
    pub fn new(id: EntityId, transform: Transform) -> Self {
        Self { id, transform }
    }
}
