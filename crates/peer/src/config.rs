use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use hotball::{SessionConfig, WorldConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub session: SessionConfig,
    pub world: WorldConfig,
    pub tick_rate: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            world: WorldConfig::default(),
            tick_rate: 60,
        }
    }
}

impl PeerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: PeerConfig =
            serde_json::from_str(r#"{ "session": { "port": 9000 }, "tick_rate": 30 }"#).unwrap();

        assert_eq!(config.session.port, 9000);
        assert_eq!(config.session.broadcast_interval_ms, 50);
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.world, WorldConfig::default());
    }

    #[test]
    fn ball_tuning_is_configurable() {
        let config: PeerConfig = serde_json::from_str(
            r#"{ "world": { "ball": { "hot_speed": 35.0 }, "ball_spawn_points": [[0.0, 1.0, 0.0]] } }"#,
        )
        .unwrap();

        assert_eq!(config.world.ball.hot_speed, 35.0);
        assert_eq!(config.world.ball.max_bounces_without_gravity, 3);
        assert_eq!(config.world.ball_spawn_points.len(), 1);
    }
}
