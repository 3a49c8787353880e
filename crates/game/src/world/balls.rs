use std::collections::HashMap;

use glam::Vec3;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::net::BallRecord;

use super::ball::{Ball, BallConfig};
use super::entity::{EntityId, EntityKind, Transform};
use super::registry::ObjectRegistry;

#[derive(Debug, Default)]
pub struct BallManager {
    balls: HashMap<EntityId, Ball>,
    spawn_points: Vec<Vec3>,
    config: BallConfig,
    next_index: u32,
}

impl BallManager {
    pub fn new(spawn_points: Vec<Vec3>, config: BallConfig) -> Self {
        Self {
            balls: HashMap::new(),
            spawn_points,
            config,
            next_index: 0,
        }
    }

    pub fn spawn_points(&self) -> &[Vec3] {
        &self.spawn_points
    }

    /// Spawns a fresh `ball_N` at `position`.
    pub fn spawn_local(&mut self, registry: &mut ObjectRegistry, position: Vec3) -> Option<EntityId> {
        let id = loop {
            let id = EntityId::ball(self.next_index);
            self.next_index += 1;
            if !self.balls.contains_key(&id) {
                break id;
            }
        };

        self.spawn_with_id(registry, id.clone(), Transform::at(position))
            .then_some(id)
    }

    pub fn spawn_with_id(
        &mut self,
        registry: &mut ObjectRegistry,
        id: EntityId,
        transform: Transform,
    ) -> bool {
        if !registry.register(&id, EntityKind::Ball) {
            return false;
        }

        log::debug!("Spawned ball {} at {:?}", id, transform.position);
        let ball = Ball::new(id.clone(), transform, self.config.clone());
        self.balls.insert(id, ball);
        true
    }

    pub fn destroy(&mut self, registry: &mut ObjectRegistry, id: &EntityId) -> bool {
        registry.unregister(id);
        self.balls.remove(id).is_some()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Ball> {
        self.balls.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Ball> {
        self.balls.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ball> {
        self.balls.values()
    }

    /// Puts a ball back at a random spawn point, cold and unowned.
    pub fn respawn<R: Rng + ?Sized>(&mut self, id: &EntityId, rng: &mut R) -> Option<Vec3> {
        let position = self.spawn_points.choose(rng).copied().unwrap_or(Vec3::ZERO);
        let ball = self.balls.get_mut(id)?;
        ball.respawn(position);
        log::debug!("Respawned ball {} at {:?}", id, position);
        Some(position)
    }

    /// Snapshot of every ball, ordered by id.
    pub fn records(&self) -> Vec<BallRecord> {
        let mut records: Vec<_> = self.balls.values().map(Ball::to_record).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Applies one replicated record. Unknown balls are spawned only when
    /// `spawn_missing` is set. Returns whether the ball was newly spawned.
    pub fn apply_record(
        &mut self,
        registry: &mut ObjectRegistry,
        record: &BallRecord,
        spawn_missing: bool,
    ) -> bool {
        let spawned = if self.balls.contains_key(&record.id) {
            false
        } else if spawn_missing {
            self.spawn_with_id(registry, record.id.clone(), record.transform())
        } else {
            log::debug!("Ball state for unknown ball {}", record.id);
            return false;
        };

        if let Some(ball) = self.balls.get_mut(&record.id) {
            ball.update_network_state(record);
        }
        spawned
    }

    pub fn len(&self) -> usize {
        self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }

    pub fn clear(&mut self) {
        self.balls.clear();
        self.next_index = 0;
    }
}
