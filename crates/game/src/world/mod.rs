mod ball;
mod balls;
mod config;
mod entity;
mod players;
mod registry;

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::net::{BallLaunch, BallRecord, TransformRecord};

pub use ball::{Ball, BallConfig, BallState, CollisionOutcome, Contact};
pub use balls::BallManager;
pub use config::WorldConfig;
pub use entity::{BALL_PREFIX, EntityId, EntityKind, PLAYER_PREFIX, Prop, Transform};
pub use players::{Player, PlayerManager};
pub use registry::ObjectRegistry;

/// A hot ball struck a player who did not throw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elimination {
    pub player: EntityId,
    pub ball: EntityId,
}

/// What applying a full snapshot batch changed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub spawned: Vec<EntityId>,
    pub destroyed: Vec<EntityId>,
    pub updated: usize,
}

/// Every replicated entity on this peer, plus the simulation clock.
pub struct World {
    registry: ObjectRegistry,
    players: PlayerManager,
    balls: BallManager,
    props: HashMap<EntityId, Prop>,
    local_player: Option<EntityId>,
    /// (ball, player) pairs currently overlapping, so a touch only counts
    /// on entry.
    touching: HashSet<(EntityId, EntityId)>,
    clock: f64,
    rng: StdRng,
    config: WorldConfig,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: WorldConfig, rng: StdRng) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            players: PlayerManager::new(config.player_spawn_points.clone()),
            balls: BallManager::new(config.ball_spawn_points.clone(), config.ball.clone()),
            props: HashMap::new(),
            local_player: None,
            touching: HashSet::new(),
            clock: 0.0,
            rng,
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Seconds of simulated time since the world was created.
    pub fn now(&self) -> f64 {
        self.clock
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn players(&self) -> &PlayerManager {
        &self.players
    }

    pub fn balls(&self) -> &BallManager {
        &self.balls
    }

    pub fn player(&self, id: &EntityId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn ball(&self, id: &EntityId) -> Option<&Ball> {
        self.balls.get(id)
    }

    pub fn local_player(&self) -> Option<&EntityId> {
        self.local_player.as_ref()
    }

    /// Binds the local self-identifier, spawning the player if this peer has
    /// not seen it yet.
    pub fn bind_local_player(&mut self, id: EntityId) -> bool {
        let spawned = if self.registry.contains(&id) {
            false
        } else {
            let spawn = self.players.spawn_point(self.players.len());
            self.players
                .spawn_local(&mut self.registry, id.clone(), Transform::at(spawn))
        };
        self.local_player = Some(id);
        spawned
    }

    /// Clears the world and spawns the host's own player and one ball per
    /// configured ball spawn point.
    pub fn populate_host(&mut self) -> EntityId {
        self.clear();

        let id = self.players.allocate_id();
        let spawn = self.players.spawn_point(0);
        self.players
            .spawn_local(&mut self.registry, id.clone(), Transform::at(spawn));

        for point in self.balls.spawn_points().to_vec() {
            self.balls.spawn_local(&mut self.registry, point);
        }

        self.local_player = Some(id.clone());
        log::info!(
            "Populated host world: {} players, {} balls",
            self.players.len(),
            self.balls.len()
        );
        id
    }

    /// Allocates a fresh player id for a joining peer and spawns its proxy.
    pub fn spawn_remote_player(&mut self) -> Option<EntityId> {
        let id = self.players.allocate_id();
        let spawn = self.players.spawn_point(self.players.len());
        self.players
            .spawn_from_remote(&mut self.registry, id.clone(), Transform::at(spawn))
            .then_some(id)
    }

    /// Spawns a proxy of the kind named by the identifier's prefix.
    pub fn spawn(&mut self, id: EntityId, transform: Transform) -> bool {
        match id.kind() {
            EntityKind::Player => self
                .players
                .spawn_from_remote(&mut self.registry, id, transform),
            EntityKind::Ball => self.balls.spawn_with_id(&mut self.registry, id, transform),
            EntityKind::Prop => {
                if !self.registry.register(&id, EntityKind::Prop) {
                    return false;
                }
                self.props.insert(id.clone(), Prop::new(id, transform));
                true
            }
        }
    }

    pub fn destroy(&mut self, id: &EntityId) -> bool {
        let destroyed = match self.registry.get(id) {
            Some(EntityKind::Player) => self.players.destroy(&mut self.registry, id),
            Some(EntityKind::Ball) => self.balls.destroy(&mut self.registry, id),
            Some(EntityKind::Prop) => {
                self.registry.unregister(id);
                self.props.remove(id).is_some()
            }
            None => false,
        };

        if destroyed {
            self.touching.retain(|(ball, player)| ball != id && player != id);
            if self.local_player.as_ref() == Some(id) {
                self.local_player = None;
            }
        }
        destroyed
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.registry.contains(id)
    }

    pub fn transform(&self, id: &EntityId) -> Option<Transform> {
        match self.registry.get(id)? {
            EntityKind::Player => self.players.get(id).map(|p| p.transform),
            EntityKind::Ball => self.balls.get(id).map(|b| b.transform),
            EntityKind::Prop => self.props.get(id).map(|p| p.transform),
        }
    }

    /// Overwrites the pose of a registered entity. A locally carried ball
    /// keeps following its carrier instead.
    pub fn apply_transform(&mut self, id: &EntityId, transform: Transform) -> bool {
        match self.registry.get(id) {
            Some(EntityKind::Player) => match self.players.get_mut(id) {
                Some(player) => {
                    player.transform = transform;
                    true
                }
                None => false,
            },
            Some(EntityKind::Ball) => match self.balls.get_mut(id) {
                Some(ball) if !ball.is_equipped() => {
                    ball.transform = transform;
                    true
                }
                _ => false,
            },
            Some(EntityKind::Prop) => match self.props.get_mut(id) {
                Some(prop) => {
                    prop.transform = transform;
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Moves the local player. Returns `false` before an identity is bound.
    pub fn set_local_transform(&mut self, transform: Transform) -> bool {
        match self.local_player.clone() {
            Some(id) => self.apply_transform(&id, transform),
            None => false,
        }
    }

    pub fn local_transform(&self) -> Option<TransformRecord> {
        let id = self.local_player.as_ref()?;
        let transform = self.transform(id)?;
        Some(TransformRecord::new(id.clone(), transform))
    }

    /// Pose of every registered entity, ordered by id.
    pub fn transform_snapshot(&self) -> Vec<TransformRecord> {
        self.registry
            .all()
            .into_iter()
            .filter_map(|(id, _)| {
                let transform = self.transform(&id)?;
                Some(TransformRecord::new(id, transform))
            })
            .collect()
    }

    pub fn player_records(&self) -> Vec<TransformRecord> {
        let mut records: Vec<_> = self
            .players
            .iter()
            .map(|p| TransformRecord::new(p.id().clone(), p.transform))
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn ball_records(&self) -> Vec<BallRecord> {
        self.balls.records()
    }

    /// Makes the local entity set match `batch` exactly: entities missing
    /// from the batch are destroyed, unknown ones are spawned, the rest are
    /// moved. The local player is never destroyed nor moved by a snapshot.
    pub fn reconcile(&mut self, batch: &[TransformRecord]) -> Reconciliation {
        let mut result = Reconciliation::default();

        let present: HashSet<&EntityId> = batch.iter().map(|r| &r.id).collect();
        let local = self.local_player.as_ref();
        let mut stale: Vec<EntityId> = self
            .registry
            .ids()
            .filter(|id| !present.contains(id) && Some(*id) != local)
            .cloned()
            .collect();
        stale.sort();

        for id in stale {
            if self.destroy(&id) {
                result.destroyed.push(id);
            }
        }

        for record in batch {
            if record.id.is_empty() || self.local_player.as_ref() == Some(&record.id) {
                continue;
            }

            if self.registry.contains(&record.id) {
                if self.apply_transform(&record.id, record.transform()) {
                    result.updated += 1;
                }
            } else if self.spawn(record.id.clone(), record.transform()) {
                result.spawned.push(record.id.clone());
            }
        }

        result
    }

    /// Applies ball records, returning the ids of balls that had to be
    /// spawned. Unknown balls are only spawned when `spawn_missing` is set.
    pub fn apply_ball_records(&mut self, records: &[BallRecord], spawn_missing: bool) -> Vec<EntityId> {
        let mut spawned = Vec::new();
        for record in records {
            if self.balls.apply_record(&mut self.registry, record, spawn_missing) {
                spawned.push(record.id.clone());
            }
        }
        spawned
    }

    /// Launches a ball from this peer. The returned launch is what gets sent
    /// to the other peers.
    pub fn launch_ball(
        &mut self,
        ball_id: &EntityId,
        direction: Vec3,
        launcher: &EntityId,
        position: Option<Vec3>,
    ) -> Option<BallLaunch> {
        let now = self.clock;
        let ball = self.balls.get_mut(ball_id)?;
        ball.launch(direction, launcher, position, now);
        let position = ball.transform.position;

        self.touching.retain(|(ball, _)| ball != ball_id);
        Some(BallLaunch {
            ball: ball_id.clone(),
            direction,
            launcher: launcher.clone(),
            position,
        })
    }

    /// Applies a launch that happened on another peer.
    pub fn apply_launch(&mut self, launch: &BallLaunch) -> bool {
        self.launch_ball(
            &launch.ball,
            launch.direction,
            &launch.launcher,
            Some(launch.position),
        )
        .is_some()
    }

    pub fn pick_up(&mut self, ball_id: &EntityId, carrier: &EntityId) -> bool {
        let Some(frame) = self.carrier_frame(carrier) else {
            return false;
        };

        let now = self.clock;
        let Some(ball) = self.balls.get_mut(ball_id) else {
            return false;
        };
        if !ball.try_equip(carrier, now) {
            return false;
        }
        ball.follow_carrier(frame);
        true
    }

    pub fn drop_ball(&mut self, ball_id: &EntityId) -> bool {
        match self.balls.get_mut(ball_id) {
            Some(ball) if ball.is_equipped() => {
                ball.unequip();
                true
            }
            _ => false,
        }
    }

    /// Ball currently carried by `carrier`, if any.
    pub fn carried_by(&self, carrier: &EntityId) -> Option<&EntityId> {
        self.balls
            .iter()
            .find(|b| b.carrier() == Some(carrier))
            .map(Ball::id)
    }

    pub fn respawn_player(&mut self, id: &EntityId) -> Option<Vec3> {
        if let Some(ball_id) = self.carried_by(id).cloned() {
            self.drop_ball(&ball_id);
        }
        self.players.respawn(id, &mut self.rng)
    }

    fn carrier_frame(&self, carrier: &EntityId) -> Option<Transform> {
        let player = self.players.get(carrier)?;
        let offset = player.transform.rotation * self.config.hold_offset;
        Some(Transform::new(
            player.transform.position + offset,
            player.transform.rotation,
        ))
    }

    /// Advances the clock by `dt` and simulates every ball. Only an
    /// authoritative peer acts on a hot ball hitting a player: it respawns
    /// the ball and reports the elimination.
    pub fn step(&mut self, dt: f32, authoritative: bool) -> Vec<Elimination> {
        self.clock += f64::from(dt);
        let now = self.clock;

        let players: Vec<(EntityId, Vec3)> = self
            .players
            .iter()
            .map(|p| (p.id().clone(), p.transform.position))
            .collect();
        let frames: HashMap<EntityId, Transform> = players
            .iter()
            .filter_map(|(id, _)| Some((id.clone(), self.carrier_frame(id)?)))
            .collect();

        let mut ball_ids: Vec<EntityId> = self.balls.iter().map(|b| b.id().clone()).collect();
        ball_ids.sort();

        let mut eliminations = Vec::new();
        for ball_id in ball_ids {
            let Some(ball) = self.balls.get_mut(&ball_id) else {
                continue;
            };

            if let Some(carrier) = ball.carrier() {
                match frames.get(carrier) {
                    Some(frame) => ball.follow_carrier(*frame),
                    None => ball.unequip(),
                }
                continue;
            }

            ball.integrate(dt, now);
            for normal in surface_contacts(&self.config, ball) {
                if ball.on_collision(&Contact::surface(normal), now) == CollisionOutcome::Ignored
                    || ball.state() == BallState::Cold
                {
                    ball.rest_against(normal);
                }
            }

            let mut struck = None;
            for (player_id, position) in &players {
                let key = (ball_id.clone(), player_id.clone());
                let offset = ball.transform.position - *position;
                if offset.length() > self.config.contact_radius {
                    self.touching.remove(&key);
                    continue;
                }
                if !self.touching.insert(key) {
                    continue;
                }

                let normal = match offset.normalize_or_zero() {
                    n if n == Vec3::ZERO => Vec3::Y,
                    n => n,
                };
                let contact = Contact::holder(player_id.clone(), normal);
                if let CollisionOutcome::HolderHit { holder } = ball.on_collision(&contact, now) {
                    struck = Some(holder);
                    break;
                }
            }

            if let Some(player) = struck {
                if !authoritative {
                    continue;
                }
                log::info!("Player {} eliminated by {}", player, ball_id);
                self.balls.respawn(&ball_id, &mut self.rng);
                self.touching.retain(|(ball, _)| ball != &ball_id);
                eliminations.push(Elimination {
                    player,
                    ball: ball_id,
                });
            }
        }

        eliminations
    }

    /// Re-indexes every live entity from the managers.
    pub fn rebuild_registry(&mut self) -> usize {
        let live: Vec<(EntityId, EntityKind)> = self
            .players
            .iter()
            .map(|p| (p.id().clone(), EntityKind::Player))
            .chain(self.balls.iter().map(|b| (b.id().clone(), EntityKind::Ball)))
            .chain(self.props.keys().map(|id| (id.clone(), EntityKind::Prop)))
            .collect();
        self.registry.rebuild(live)
    }

    pub fn clear(&mut self) {
        self.registry.clear();
        self.players.clear();
        self.balls.clear();
        self.props.clear();
        self.touching.clear();
        self.local_player = None;
    }
}

/// Floor and wall contacts for a ball that has crossed them, clamping it
/// back inside. Only surfaces the ball is moving into are reported.
fn surface_contacts(config: &WorldConfig, ball: &mut Ball) -> Vec<Vec3> {
    let mut normals = Vec::new();
    let velocity = ball.velocity();
    let position = &mut ball.transform.position;

    if let Some(floor) = config.floor_height {
        if position.y <= floor {
            position.y = floor;
            if velocity.y < 0.0 {
                normals.push(Vec3::Y);
            }
        }
    }

    if let Some(half) = config.arena_half_extent {
        if position.x >= half {
            position.x = half;
            if velocity.x > 0.0 {
                normals.push(Vec3::NEG_X);
            }
        } else if position.x <= -half {
            position.x = -half;
            if velocity.x < 0.0 {
                normals.push(Vec3::X);
            }
        }

        if position.z >= half {
            position.z = half;
            if velocity.z > 0.0 {
                normals.push(Vec3::NEG_Z);
            }
        } else if position.z <= -half {
            position.z = -half;
            if velocity.z < 0.0 {
                normals.push(Vec3::Z);
            }
        }
    }

    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_world() -> World {
        World::with_rng(
            WorldConfig {
                player_spawn_points: vec![Vec3::new(0.0, 1.0, -5.0), Vec3::new(0.0, 1.0, 5.0)],
                ball_spawn_points: vec![Vec3::new(3.0, 0.0, 0.0)],
                floor_height: None,
                arena_half_extent: None,
                ..Default::default()
            },
            StdRng::seed_from_u64(3),
        )
    }

    fn record(id: &str, x: f32) -> TransformRecord {
        TransformRecord::new(EntityId::from(id), Transform::at(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn host_population_spawns_player_and_balls() {
        let mut world = World::new(WorldConfig::default());
        let local = world.populate_host();

        assert_eq!(local, EntityId::player(0));
        assert_eq!(world.local_player(), Some(&local));
        assert_eq!(world.balls().len(), 2);
        assert!(world.contains(&EntityId::ball(1)));
        assert_eq!(world.spawn_remote_player(), Some(EntityId::player(1)));
    }

    #[test]
    fn reconcile_matches_batch_exactly() {
        let mut world = open_world();
        world.spawn(EntityId::from("player_1"), Transform::default());
        world.spawn(EntityId::from("ball_0"), Transform::default());
        world.spawn(EntityId::from("crate_3"), Transform::default());

        let batch = vec![record("player_1", 1.0), record("ball_7", 2.0), record("crate_9", 3.0)];
        let result = world.reconcile(&batch);

        assert_eq!(
            result.destroyed,
            vec![EntityId::from("ball_0"), EntityId::from("crate_3")]
        );
        assert_eq!(
            result.spawned,
            vec![EntityId::from("ball_7"), EntityId::from("crate_9")]
        );
        assert_eq!(result.updated, 1);

        let mut ids: Vec<_> = world.registry().ids().cloned().collect();
        ids.sort();
        let mut expected: Vec<_> = batch.iter().map(|r| r.id.clone()).collect();
        expected.sort();
        assert_eq!(ids, expected);

        assert_eq!(world.registry().get(&EntityId::from("ball_7")), Some(EntityKind::Ball));
        assert_eq!(
            world.transform(&EntityId::from("player_1")).map(|t| t.position.x),
            Some(1.0)
        );
    }

    #[test]
    fn reconcile_keeps_local_player() {
        let mut world = open_world();
        world.bind_local_player(EntityId::player(2));
        world.set_local_transform(Transform::at(Vec3::new(9.0, 0.0, 0.0)));

        world.reconcile(&[record("player_0", 0.0)]);
        assert!(world.contains(&EntityId::player(2)));

        world.reconcile(&[record("player_2", -4.0)]);
        assert_eq!(
            world.local_transform().map(|r| r.position),
            Some(Vec3::new(9.0, 0.0, 0.0))
        );
    }

    #[test]
    fn carried_ball_ignores_remote_pose() {
        let mut world = open_world();
        let local = world.populate_host();
        let ball = EntityId::ball(0);

        assert!(world.pick_up(&ball, &local));
        assert_eq!(world.carried_by(&local), Some(&ball));
        assert!(!world.apply_transform(&ball, Transform::at(Vec3::splat(40.0))));

        world.step(0.1, true);
        let carried = world.ball(&ball).map(|b| b.transform.position);
        let player = world.transform(&local).map(|t| t.position);
        assert_ne!(carried, Some(Vec3::splat(40.0)));
        assert!(carried.zip(player).is_some_and(|(b, p)| b.distance(p) < 1.0));
    }

    #[test]
    fn owner_catch_then_drop_falls() {
        let mut world = open_world();
        let local = world.populate_host();
        let ball = EntityId::ball(0);

        world.launch_ball(&ball, Vec3::X, &local, Some(Vec3::new(0.0, 5.0, 0.0)));
        for _ in 0..12 {
            world.step(0.05, true);
        }
        assert!(world.pick_up(&ball, &local));
        assert!(world.drop_ball(&ball));
        world.set_local_transform(Transform::at(Vec3::new(0.0, 1.0, -30.0)));

        let dropped_at = world.ball(&ball).unwrap().transform.position;
        for _ in 0..10 {
            world.step(0.05, true);
        }
        let dropped = world.ball(&ball).unwrap();
        assert_eq!(dropped.state(), BallState::Hot);
        assert!(dropped.velocity().y < 0.0);
        assert!(dropped.transform.position.y < dropped_at.y);
    }

    #[test]
    fn hot_ball_eliminates_other_player_on_host() {
        let mut world = open_world();
        let host = world.populate_host();
        let victim = world.spawn_remote_player().unwrap();
        let ball = EntityId::ball(0);

        let victim_position = world.transform(&victim).unwrap().position;
        let start = victim_position - Vec3::Z * 2.0;
        world.launch_ball(&ball, Vec3::Z, &host, Some(start)).unwrap();

        let mut eliminations = Vec::new();
        for _ in 0..20 {
            eliminations = world.step(0.02, true);
            if !eliminations.is_empty() {
                break;
            }
        }

        assert_eq!(
            eliminations,
            vec![Elimination {
                player: victim.clone(),
                ball: ball.clone(),
            }]
        );
        let ball = world.ball(&ball).unwrap();
        assert_eq!(ball.state(), BallState::Cold);
        assert_eq!(ball.transform.position, Vec3::new(3.0, 0.0, 0.0));
        assert!(world.respawn_player(&victim).is_some());
    }

    #[test]
    fn non_authoritative_peer_takes_no_action() {
        let mut world = open_world();
        let host = world.populate_host();
        let victim = world.spawn_remote_player().unwrap();
        let ball = EntityId::ball(0);

        let start = world.transform(&victim).unwrap().position - Vec3::Z * 2.0;
        world.launch_ball(&ball, Vec3::Z, &host, Some(start));

        for _ in 0..20 {
            assert!(world.step(0.02, false).is_empty());
        }
        assert_eq!(world.ball(&ball).map(Ball::state), Some(BallState::Hot));
    }

    #[test]
    fn floor_bounces_cool_a_ball() {
        let mut world = World::with_rng(
            WorldConfig {
                player_spawn_points: vec![Vec3::new(50.0, 0.0, 50.0)],
                arena_half_extent: None,
                ..Default::default()
            },
            StdRng::seed_from_u64(0),
        );
        let host = world.populate_host();
        let ball = EntityId::ball(0);

        world.launch_ball(&ball, Vec3::new(0.0, -1.0, 0.0), &host, Some(Vec3::new(0.0, 1.0, 0.0)));

        // Gravity is off while hot, so one reflection sends it straight up.
        for _ in 0..10 {
            world.step(0.05, true);
        }
        let state = world.ball(&ball).unwrap();
        assert_eq!(state.bounce_count(), 1);
        assert_eq!(state.state(), BallState::Hot);
        assert!(state.velocity().y > 0.0);
    }

    #[test]
    fn destroy_unknown_is_noop() {
        let mut world = open_world();
        assert!(!world.destroy(&EntityId::from("ghost")));
        assert!(world.registry().is_empty());
    }

    #[test]
    fn rebuild_recovers_index() {
        let mut world = open_world();
        world.populate_host();
        world.spawn(EntityId::from("crate_1"), Transform::default());
        assert_eq!(world.rebuild_registry(), 3);
    }
}
