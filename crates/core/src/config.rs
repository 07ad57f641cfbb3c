use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Game rules as broadcast by the server on connection.
///
/// Interval fields arrive as strings such as `"1s"` or `"infinite"` and are
/// kept in milliseconds; an infinite interval is `f64::INFINITY`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct GameConfig {
    #[serde(deserialize_with = "interval_ms")]
    pub parcels_generation_interval: f64,
    pub parcels_max: Option<u32>,
    pub parcel_reward_avg: f64,
    pub parcel_reward_variance: f64,
    #[serde(deserialize_with = "interval_ms")]
    pub parcel_decading_interval: f64,
    pub penalty: f64,
    pub movement_steps: u32,
    /// Milliseconds one grid move takes.
    pub movement_duration: u64,
    pub agents_observation_distance: u32,
    pub parcels_observation_distance: u32,
    pub agent_timeout: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            parcels_generation_interval: 2_000.0,
            parcels_max: None,
            parcel_reward_avg: 30.0,
            parcel_reward_variance: 10.0,
            parcel_decading_interval: 1_000.0,
            penalty: 1.0,
            movement_steps: 1,
            movement_duration: 50,
            agents_observation_distance: 5,
            parcels_observation_distance: 5,
            agent_timeout: 10_000,
        }
    }
}

impl GameConfig {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Reward a parcel loses over `elapsed_ms`.
    pub fn decay_over(&self, elapsed_ms: f64) -> f64 {
        elapsed_ms / self.parcel_decading_interval
    }

    pub fn movement(&self) -> Duration {
        Duration::from_millis(self.movement_duration)
    }
}

/// Parse an interval setting into milliseconds.
pub fn parse_interval(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("infinite") {
        return Ok(f64::INFINITY);
    }
    let invalid = || CoreError::InvalidConfig {
        key: "interval".to_string(),
        value: raw.to_string(),
    };
    if let Some(ms) = trimmed.strip_suffix("ms") {
        return ms.trim().parse::<f64>().map_err(|_| invalid());
    }
    if let Some(secs) = trimmed.strip_suffix('s') {
        return secs
            .trim()
            .parse::<f64>()
            .map(|s| s * 1_000.0)
            .map_err(|_| invalid());
    }
    trimmed.parse::<f64>().map_err(|_| invalid())
}

fn interval_ms<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Ok(ms),
        Raw::Text(text) => parse_interval(&text).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamMode {
    #[default]
    Solo,
    Team,
}

/// Tunables of the agent itself, independent of the game rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub mode: TeamMode,
    pub use_pddl: bool,
    /// Shift applied by the handshake cipher.
    pub secret_key: u32,
    /// Unseen parcels older than this are forgotten.
    pub parcel_grace_ms: u64,
    /// Unseen parcels whose decayed reward drops to this are forgotten.
    pub min_retained_reward: f64,
    /// Rival agents unseen for this many moves are forgotten.
    pub agent_memory_moves: u32,
    pub failure_threshold: u32,
    pub random_walk_steps: u32,
    pub idle_top_n: usize,
    pub staleness_weight: f64,
    /// Spawn-to-walkable ratio above which a map counts as dense.
    pub high_density_threshold: f64,
    pub ask_timeout_ms: u64,
    pub idle_backoff_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            mode: TeamMode::Solo,
            use_pddl: false,
            secret_key: 5,
            parcel_grace_ms: 10_000,
            min_retained_reward: 5.0,
            agent_memory_moves: 5,
            failure_threshold: 3,
            random_walk_steps: 8,
            idle_top_n: 4,
            staleness_weight: 2.0,
            high_density_threshold: 0.4,
            ask_timeout_ms: 1_000,
            idle_backoff_ms: 1_000,
        }
    }
}

impl AgentSettings {
    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1s").unwrap(), 1_000.0);
        assert_eq!(parse_interval("250ms").unwrap(), 250.0);
        assert!(parse_interval("infinite").unwrap().is_infinite());
        assert!(parse_interval("soon").is_err());
    }

    #[test]
    fn test_game_config_from_server_payload() {
        let config = GameConfig::from_json(json!({
            "PARCELS_GENERATION_INTERVAL": "2s",
            "PARCELS_MAX": 5,
            "PARCEL_REWARD_AVG": 30,
            "PARCEL_REWARD_VARIANCE": 10,
            "PARCEL_DECADING_INTERVAL": "infinite",
            "MOVEMENT_STEPS": 1,
            "MOVEMENT_DURATION": 500,
            "AGENTS_OBSERVATION_DISTANCE": 5,
            "PARCELS_OBSERVATION_DISTANCE": 5,
            "AGENT_TIMEOUT": 10000,
            "CLOCK": 50
        }))
        .unwrap();

        assert_eq!(config.parcels_generation_interval, 2_000.0);
        assert!(config.parcel_decading_interval.is_infinite());
        assert_eq!(config.decay_over(10_000.0), 0.0);
        assert_eq!(config.movement_duration, 500);
        assert_eq!(config.parcels_max, Some(5));
    }

    #[test]
    fn test_settings_defaults_fill_missing_fields() {
        let settings: AgentSettings =
            serde_json::from_value(json!({ "mode": "team", "use_pddl": true })).unwrap();
        assert_eq!(settings.mode, TeamMode::Team);
        assert!(settings.use_pddl);
        assert_eq!(settings.secret_key, 5);
        assert_eq!(settings.failure_threshold, 3);
    }
}
