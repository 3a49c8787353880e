use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::net::BallRecord;

use super::entity::{EntityId, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum BallState {
    /// Inert, gravity-affected, unowned.
    #[default]
    Cold = 0,
    /// In flight and attributed to the player who launched it.
    Hot = 1,
}

impl TryFrom<u8> for BallState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cold),
            1 => Ok(Self::Hot),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub hot_speed: f32,
    pub max_bounces_without_gravity: i32,
    pub gravity: f32,
    /// Also the length of the window during which the launcher cannot touch
    /// the ball it just threw.
    pub pickup_cooldown_secs: f32,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            hot_speed: 20.0,
            max_bounces_without_gravity: 3,
            gravity: -9.81,
            pickup_cooldown_secs: 0.5,
        }
    }
}

/// A contact reported by whatever detects collisions. `holder` is set when
/// the other body is a player that could carry the ball.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub holder: Option<EntityId>,
    pub normal: Vec3,
}

impl Contact {
    pub fn surface(normal: Vec3) -> Self {
        Self {
            holder: None,
            normal,
        }
    }

    pub fn holder(id: EntityId, normal: Vec3) -> Self {
        Self {
            holder: Some(id),
            normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollisionOutcome {
    Ignored,
    Bounced { bounce_count: i32 },
    /// The bounce budget ran out and the ball went cold.
    Cooled,
    /// A hot ball struck a holder other than its owner.
    HolderHit { holder: EntityId },
}

#[derive(Debug, Clone)]
pub struct Ball {
    id: EntityId,
    pub transform: Transform,
    velocity: Vec3,
    state: BallState,
    owner: Option<EntityId>,
    bounce_count: i32,
    carrier: Option<EntityId>,
    last_launch_time: f64,
    launcher_grace: Option<(EntityId, f64)>,
    gravity_enabled: bool,
    collision_enabled: bool,
    config: BallConfig,
}

impl Ball {
    pub fn new(id: EntityId, transform: Transform, config: BallConfig) -> Self {
        Self {
            id,
            transform,
            velocity: Vec3::ZERO,
            state: BallState::Cold,
            owner: None,
            bounce_count: 0,
            carrier: None,
            last_launch_time: f64::NEG_INFINITY,
            launcher_grace: None,
            gravity_enabled: true,
            collision_enabled: true,
            config,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn state(&self) -> BallState {
        self.state
    }

    pub fn owner(&self) -> Option<&EntityId> {
        self.owner.as_ref()
    }

    pub fn bounce_count(&self) -> i32 {
        self.bounce_count
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn carrier(&self) -> Option<&EntityId> {
        self.carrier.as_ref()
    }

    pub fn is_equipped(&self) -> bool {
        self.carrier.is_some()
    }

    pub fn gravity_enabled(&self) -> bool {
        self.gravity_enabled
    }

    pub fn collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    pub fn config(&self) -> &BallConfig {
        &self.config
    }

    /// Whether contacts with `holder` are currently suppressed because it
    /// launched the ball a moment ago.
    pub fn ignores(&self, holder: &EntityId, now: f64) -> bool {
        matches!(&self.launcher_grace, Some((launcher, until)) if launcher == holder && now < *until)
    }

    pub fn launch(&mut self, direction: Vec3, launcher: &EntityId, position: Option<Vec3>, now: f64) {
        self.state = BallState::Hot;
        self.owner = Some(launcher.clone());
        self.bounce_count = 0;
        self.velocity = direction.normalize_or_zero() * self.config.hot_speed;
        self.last_launch_time = now;

        self.carrier = None;
        if let Some(position) = position {
            self.transform.position = position;
        }

        self.gravity_enabled = false;
        self.collision_enabled = true;
        self.launcher_grace = Some((
            launcher.clone(),
            now + f64::from(self.config.pickup_cooldown_secs),
        ));
    }

    pub fn on_collision(&mut self, contact: &Contact, now: f64) -> CollisionOutcome {
        if self.is_equipped() || !self.collision_enabled || self.state != BallState::Hot {
            return CollisionOutcome::Ignored;
        }

        if let Some(holder) = &contact.holder {
            if self.ignores(holder, now) {
                return CollisionOutcome::Ignored;
            }
            if self.owner.as_ref() != Some(holder) {
                return CollisionOutcome::HolderHit {
                    holder: holder.clone(),
                };
            }
        }

        self.bounce_count += 1;
        if self.bounce_count < self.config.max_bounces_without_gravity {
            let reflected = reflect(self.velocity, contact.normal);
            self.velocity = reflected.normalize_or_zero() * self.config.hot_speed;
            CollisionOutcome::Bounced {
                bounce_count: self.bounce_count,
            }
        } else {
            self.transition_to_cold();
            CollisionOutcome::Cooled
        }
    }

    fn transition_to_cold(&mut self) {
        self.state = BallState::Cold;
        self.owner = None;
        self.gravity_enabled = true;
    }

    pub fn can_be_picked_up(&self, requester: &EntityId, now: f64) -> bool {
        if now - self.last_launch_time < f64::from(self.config.pickup_cooldown_secs) {
            return false;
        }

        if self.state == BallState::Hot && self.owner.as_ref() != Some(requester) {
            return false;
        }

        true
    }

    /// Attaches the ball to `carrier` if pickup is allowed and nobody else is
    /// carrying it.
    pub fn try_equip(&mut self, carrier: &EntityId, now: f64) -> bool {
        if self.carrier.as_ref().is_some_and(|current| current != carrier) {
            return false;
        }
        if !self.can_be_picked_up(carrier, now) {
            return false;
        }

        self.equip(carrier);
        true
    }

    fn equip(&mut self, carrier: &EntityId) {
        self.carrier = Some(carrier.clone());
        self.collision_enabled = false;
        self.launcher_grace = None;
        self.velocity = Vec3::ZERO;
        self.gravity_enabled = false;
    }

    /// Detaches from the carrier. State and owner are left for the next
    /// launch to decide.
    pub fn unequip(&mut self) {
        self.carrier = None;
        self.collision_enabled = true;
        self.gravity_enabled = true;
    }

    /// Snaps an equipped ball onto its carrier's frame.
    pub fn follow_carrier(&mut self, carrier_transform: Transform) {
        if self.is_equipped() {
            self.transform = carrier_transform;
        }
    }

    /// Applies a replicated snapshot. Ignored while carried locally so a
    /// carried ball never snaps back to a stale pose.
    pub fn update_network_state(&mut self, record: &BallRecord) -> bool {
        if self.is_equipped() {
            return false;
        }

        self.transform = record.transform();
        self.velocity = record.velocity;
        self.state = record.state;
        self.owner = record.owner.clone();
        self.bounce_count = record.bounce_count;
        self.gravity_enabled = !self.flying_hot();
        true
    }

    /// Puts the ball back into play: cold, unowned, at rest.
    pub fn respawn(&mut self, position: Vec3) {
        self.transform = Transform::at(position);
        self.state = BallState::Cold;
        self.owner = None;
        self.velocity = Vec3::ZERO;
        self.carrier = None;
        self.launcher_grace = None;
        self.gravity_enabled = true;
        self.collision_enabled = true;
    }

    /// Point-mass integration step. Gravity applies whenever it is enabled;
    /// a launch suspends it until the ball cools, is dropped or respawns.
    pub fn integrate(&mut self, dt: f32, now: f64) {
        if matches!(&self.launcher_grace, Some((_, until)) if now >= *until) {
            self.launcher_grace = None;
        }

        if self.is_equipped() {
            return;
        }

        if self.gravity_enabled {
            self.velocity.y += self.config.gravity * dt;
        }

        self.transform.position += self.velocity * dt;
    }

    /// Cancels the part of the velocity heading into a surface, for a ball
    /// that is not flying hot and so does not bounce.
    pub fn rest_against(&mut self, normal: Vec3) {
        let into = self.velocity.dot(normal);
        if into < 0.0 {
            self.velocity -= into * normal;
        }
    }

    fn flying_hot(&self) -> bool {
        self.state == BallState::Hot && self.bounce_count < self.config.max_bounces_without_gravity
    }

    pub fn to_record(&self) -> BallRecord {
        BallRecord {
            id: self.id.clone(),
            position: self.transform.position,
            rotation: self.transform.rotation,
            velocity: self.velocity,
            state: self.state,
            owner: self.owner.clone(),
            bounce_count: self.bounce_count,
        }
    }
}

fn reflect(velocity: Vec3, normal: Vec3) -> Vec3 {
    let normal = normal.normalize_or_zero();
    velocity - 2.0 * velocity.dot(normal) * normal
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    fn ball() -> Ball {
        Ball::new(EntityId::ball(0), Transform::default(), BallConfig::default())
    }

    fn launcher() -> EntityId {
        EntityId::player(0)
    }

    fn assert_invariants(ball: &Ball) {
        if ball.owner().is_some() {
            assert_eq!(ball.state(), BallState::Hot);
        }
        if ball.state() == BallState::Hot {
            assert!(ball.bounce_count() < ball.config().max_bounces_without_gravity);
        }
    }

    #[test]
    fn launch_sets_hot_flight() {
        let mut ball = ball();
        ball.launch(Vec3::new(0.0, 0.0, 1.0), &launcher(), None, 10.0);

        assert_eq!(ball.velocity(), Vec3::new(0.0, 0.0, 20.0));
        assert_eq!(ball.state(), BallState::Hot);
        assert_eq!(ball.bounce_count(), 0);
        assert_eq!(ball.owner(), Some(&launcher()));
        assert!(!ball.gravity_enabled());
        assert_invariants(&ball);
    }

    #[test]
    fn launch_normalizes_direction_and_moves_to_spawn() {
        let mut ball = ball();
        ball.launch(Vec3::new(3.0, 0.0, 4.0), &launcher(), Some(Vec3::Y), 0.0);

        assert!((ball.velocity().length() - 20.0).abs() < 1e-4);
        assert_eq!(ball.transform.position, Vec3::Y);
    }

    #[test]
    fn three_bounces_cool_the_ball() {
        let mut ball = ball();
        ball.launch(Vec3::Z, &launcher(), None, 0.0);

        let wall = Contact::surface(Vec3::NEG_Z);
        assert_eq!(
            ball.on_collision(&wall, 1.0),
            CollisionOutcome::Bounced { bounce_count: 1 }
        );
        assert_eq!(ball.owner(), Some(&launcher()));
        assert_invariants(&ball);

        assert_eq!(
            ball.on_collision(&wall, 1.1),
            CollisionOutcome::Bounced { bounce_count: 2 }
        );
        assert_eq!(ball.state(), BallState::Hot);
        assert_invariants(&ball);

        assert_eq!(ball.on_collision(&wall, 1.2), CollisionOutcome::Cooled);
        assert_eq!(ball.bounce_count(), 3);
        assert_eq!(ball.state(), BallState::Cold);
        assert_eq!(ball.owner(), None);
        assert!(ball.gravity_enabled());
        assert_invariants(&ball);
    }

    #[test]
    fn bounce_reflects_about_normal() {
        let mut ball = ball();
        ball.launch(Vec3::new(1.0, -1.0, 0.0), &launcher(), None, 0.0);
        ball.on_collision(&Contact::surface(Vec3::Y), 1.0);

        let v = ball.velocity();
        assert!(v.y > 0.0);
        assert!(v.x > 0.0);
        assert!((v.length() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn cold_ball_ignores_collisions() {
        let mut ball = ball();
        assert_eq!(
            ball.on_collision(&Contact::surface(Vec3::Y), 0.0),
            CollisionOutcome::Ignored
        );
        assert_eq!(ball.bounce_count(), 0);
    }

    #[test]
    fn non_owner_holder_is_hit() {
        let mut ball = ball();
        ball.launch(Vec3::Z, &launcher(), None, 0.0);

        let victim = EntityId::player(1);
        assert_eq!(
            ball.on_collision(&Contact::holder(victim.clone(), Vec3::NEG_Z), 0.1),
            CollisionOutcome::HolderHit { holder: victim }
        );
        assert_eq!(ball.bounce_count(), 0);
    }

    #[test]
    fn launcher_is_ignored_during_grace_window() {
        let mut ball = ball();
        ball.launch(Vec3::Z, &launcher(), None, 0.0);

        let contact = Contact::holder(launcher(), Vec3::NEG_Z);
        assert_eq!(ball.on_collision(&contact, 0.2), CollisionOutcome::Ignored);

        ball.integrate(0.0, 0.6);
        assert!(!ball.ignores(&launcher(), 0.6));
        assert_eq!(
            ball.on_collision(&contact, 0.6),
            CollisionOutcome::Bounced { bounce_count: 1 }
        );
    }

    #[test]
    fn pickup_requires_cooldown() {
        let mut ball = ball();
        assert!(ball.can_be_picked_up(&EntityId::player(5), 0.0));

        ball.launch(Vec3::Z, &launcher(), None, 10.0);
        assert!(!ball.can_be_picked_up(&launcher(), 10.2));
        assert!(ball.can_be_picked_up(&launcher(), 10.6));
    }

    #[test]
    fn hot_ball_only_returns_to_owner() {
        let mut ball = ball();
        ball.launch(Vec3::Z, &launcher(), None, 0.0);

        let other = EntityId::player(1);
        assert!(!ball.can_be_picked_up(&other, 0.2));
        assert!(!ball.can_be_picked_up(&other, 100.0));
        assert!(!ball.try_equip(&other, 100.0));
        assert!(ball.try_equip(&launcher(), 100.0));
    }

    #[test]
    fn equip_suspends_simulation_and_snapshots() {
        let mut ball = ball();
        let carrier = EntityId::player(1);
        assert!(ball.try_equip(&carrier, 0.0));
        assert!(!ball.collision_enabled());
        assert!(!ball.gravity_enabled());
        assert_eq!(ball.velocity(), Vec3::ZERO);

        ball.integrate(1.0, 1.0);
        assert_eq!(ball.transform.position, Vec3::ZERO);

        let carried_to = Transform::new(Vec3::new(2.0, 1.0, 0.0), Quat::from_rotation_y(1.0));
        ball.follow_carrier(carried_to);
        assert_eq!(ball.transform, carried_to);

        let mut record = ball.to_record();
        record.position = Vec3::splat(50.0);
        assert!(!ball.update_network_state(&record));
        assert_eq!(ball.transform, carried_to);

        assert!(!ball.try_equip(&EntityId::player(2), 5.0));

        ball.unequip();
        assert!(ball.collision_enabled());
        assert!(ball.gravity_enabled());
        assert_eq!(ball.state(), BallState::Cold);
        assert!(ball.update_network_state(&record));
        assert_eq!(ball.transform.position, Vec3::splat(50.0));
    }

    #[test]
    fn dropped_hot_ball_falls() {
        let mut ball = ball();
        ball.launch(Vec3::Z, &launcher(), Some(Vec3::new(0.0, 5.0, 0.0)), 0.0);
        assert!(ball.try_equip(&launcher(), 1.0));
        ball.unequip();
        assert_eq!(ball.state(), BallState::Hot);
        assert!(ball.gravity_enabled());

        for step in 0..100 {
            ball.integrate(0.02, 1.0 + f64::from(step) * 0.02);
        }
        assert!(ball.velocity().y < 0.0);
        assert!(ball.transform.position.y < 5.0);
    }

    #[test]
    fn network_state_toggles_gravity() {
        let mut ball = ball();
        let mut record = ball.to_record();
        record.state = BallState::Hot;
        record.owner = Some(launcher());
        record.bounce_count = 1;

        ball.update_network_state(&record);
        assert!(!ball.gravity_enabled());

        record.state = BallState::Cold;
        record.owner = None;
        ball.update_network_state(&record);
        assert!(ball.gravity_enabled());
    }

    #[test]
    fn hot_flight_ignores_gravity() {
        let mut ball = ball();
        ball.launch(Vec3::X, &launcher(), None, 0.0);
        ball.integrate(0.5, 0.5);
        assert_eq!(ball.velocity(), Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(ball.transform.position, Vec3::new(10.0, 0.0, 0.0));

        let mut cold = self::ball();
        cold.integrate(1.0, 1.0);
        assert!(cold.velocity().y < 0.0);
    }

    #[test]
    fn respawn_resets_to_cold_rest() {
        let mut ball = ball();
        ball.launch(Vec3::Z, &launcher(), None, 0.0);
        ball.respawn(Vec3::new(0.0, 2.0, 0.0));

        assert_eq!(ball.state(), BallState::Cold);
        assert_eq!(ball.owner(), None);
        assert_eq!(ball.velocity(), Vec3::ZERO);
        assert!(ball.gravity_enabled());
        assert_eq!(ball.transform.position, Vec3::new(0.0, 2.0, 0.0));
    }
}
