use std::collections::HashMap;

use glam::Vec3;
use rand::Rng;
use rand::seq::SliceRandom;

use super::entity::{EntityId, EntityKind, Transform};
use super::registry::ObjectRegistry;

#[derive(Debug, Clone)]
pub struct Player {
    id: EntityId,
    pub transform: Transform,
}

impl Player {
    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Owns every player entity on this peer and hands out `player_N` ids.
#[derive(Debug, Default)]
pub struct PlayerManager {
    players: HashMap<EntityId, Player>,
    spawn_points: Vec<Vec3>,
    next_index: u32,
}

impl PlayerManager {
    pub fn new(spawn_points: Vec<Vec3>) -> Self {
        Self {
            players: HashMap::new(),
            spawn_points,
            next_index: 0,
        }
    }

    /// Next free identifier. Identifiers are never handed out twice within a
    /// session even after the player leaves.
    pub fn allocate_id(&mut self) -> EntityId {
        loop {
            let id = EntityId::player(self.next_index);
            self.next_index += 1;
            if !self.players.contains_key(&id) {
                return id;
            }
        }
    }

    /// Spawn point for the n-th player, cycling through the configured list.
    pub fn spawn_point(&self, index: usize) -> Vec3 {
        if self.spawn_points.is_empty() {
            return Vec3::ZERO;
        }
        self.spawn_points[index % self.spawn_points.len()]
    }

    pub fn spawn_local(
        &mut self,
        registry: &mut ObjectRegistry,
        id: EntityId,
        transform: Transform,
    ) -> bool {
        self.insert(registry, id, transform, "local")
    }

    pub fn spawn_from_remote(
        &mut self,
        registry: &mut ObjectRegistry,
        id: EntityId,
        transform: Transform,
    ) -> bool {
        self.insert(registry, id, transform, "proxy")
    }

    fn insert(
        &mut self,
        registry: &mut ObjectRegistry,
        id: EntityId,
        transform: Transform,
        origin: &str,
    ) -> bool {
        if !registry.register(&id, EntityKind::Player) {
            return false;
        }

        log::debug!("Spawned {} player {} at {:?}", origin, id, transform.position);
        self.players.insert(id.clone(), Player { id, transform });
        true
    }

    pub fn destroy(&mut self, registry: &mut ObjectRegistry, id: &EntityId) -> bool {
        registry.unregister(id);
        self.players.remove(id).is_some()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Moves a player to a random spawn point. Returns the new position.
    pub fn respawn<R: Rng + ?Sized>(&mut self, id: &EntityId, rng: &mut R) -> Option<Vec3> {
        let position = self.spawn_points.choose(rng).copied().unwrap_or(Vec3::ZERO);
        let player = self.players.get_mut(id)?;
        player.transform = Transform::at(position);
        Some(position)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
        self.next_index = 0;
    }
}
