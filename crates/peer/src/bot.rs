use glam::{Quat, Vec3};

use hotball::{BallState, EntityId, Session, Transform, World};

const MOVE_SPEED: f32 = 4.0;
const PICKUP_RANGE: f32 = 1.0;
/// Seconds a freshly caught ball is held before it is thrown.
const HOLD_TIME: f32 = 0.75;

/// Stand-in for a human player: walks to the nearest cold ball, picks it
/// up and throws it at the nearest opponent.
#[derive(Debug, Default)]
pub struct Bot {
    held_for: f32,
}

impl Bot {
    pub fn drive(&mut self, session: &mut Session, world: &mut World, dt: f32) {
        let Some(me) = world.local_player().cloned() else {
            return;
        };
        let Some(transform) = world.transform(&me) else {
            return;
        };

        if let Some(ball) = world.carried_by(&me).cloned() {
            self.held_for += dt;
            if self.held_for < HOLD_TIME {
                return;
            }
            if let Some(target) = nearest_opponent(world, &me, transform.position) {
                self.held_for = 0.0;
                let direction = target - transform.position;
                if let Err(e) = session.launch_ball(world, &ball, direction, None) {
                    log::warn!("Bot failed to launch {}: {}", ball, e);
                }
            }
            return;
        }

        let Some((ball, position)) = nearest_free_ball(world, transform.position) else {
            return;
        };

        let offset = (position - transform.position) * Vec3::new(1.0, 0.0, 1.0);
        if offset.length() <= PICKUP_RANGE {
            if world.pick_up(&ball, &me) {
                log::debug!("Bot picked up {}", ball);
                self.held_for = 0.0;
            }
            return;
        }

        let step = offset.normalize_or_zero() * MOVE_SPEED * dt;
        let heading = Quat::from_rotation_y(step.x.atan2(step.z));
        world.set_local_transform(Transform::new(transform.position + step, heading));
    }
}

fn nearest_opponent(world: &World, me: &EntityId, from: Vec3) -> Option<Vec3> {
    world
        .players()
        .iter()
        .filter(|player| player.id() != me)
        .map(|player| player.transform.position)
        .min_by(|a, b| a.distance(from).total_cmp(&b.distance(from)))
}

fn nearest_free_ball(world: &World, from: Vec3) -> Option<(EntityId, Vec3)> {
    world
        .balls()
        .iter()
        .filter(|ball| ball.state() == BallState::Cold && !ball.is_equipped())
        .map(|ball| (ball.id().clone(), ball.transform.position))
        .min_by(|a, b| a.1.distance(from).total_cmp(&b.1.distance(from)))
}
