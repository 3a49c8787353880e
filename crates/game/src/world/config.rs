use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::ball::BallConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub player_spawn_points: Vec<Vec3>,
    /// One ball is spawned per point when hosting; respawns pick among them.
    pub ball_spawn_points: Vec<Vec3>,
    pub ball: BallConfig,

    /// Height of the ground plane. `None` lets balls fall forever.
    pub floor_height: Option<f32>,
    /// Half-width of the square arena walls around the origin.
    pub arena_half_extent: Option<f32>,
    /// Ball-to-player distance counted as a touch.
    pub contact_radius: f32,
    /// Where a carried ball sits relative to its carrier.
    pub hold_offset: Vec3,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            player_spawn_points: vec![
                Vec3::new(0.0, 1.0, -8.0),
                Vec3::new(0.0, 1.0, 8.0),
                Vec3::new(-8.0, 1.0, 0.0),
                Vec3::new(8.0, 1.0, 0.0),
            ],
            ball_spawn_points: vec![Vec3::new(-2.0, 0.5, 0.0), Vec3::new(2.0, 0.5, 0.0)],
            ball: BallConfig::default(),

            floor_height: Some(0.0),
            arena_half_extent: Some(12.0),
            contact_radius: 0.8,
            hold_offset: Vec3::new(0.0, 0.5, 0.6),
        }
    }
}
