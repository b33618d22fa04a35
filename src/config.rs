use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_BUFFER_CAPACITY: usize = 10 * 1024;
pub const DEFAULT_MAX_SCALE_FACTOR: u32 = 200;
pub const DEFAULT_MIN_SCALE_FACTOR: u32 = 10;

/// Tunables for one playback session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Upper bound on a single network wait, in milliseconds.
    pub read_timeout_ms: u64,
    /// Capacity of the encoded-byte buffer fed to the decoder.
    pub buffer_capacity: usize,
    /// First multiplier tried on the platform minimum sink buffer size.
    pub max_scale_factor: u32,
    /// Smallest multiplier tried before giving up on the sink.
    pub min_scale_factor: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_scale_factor: DEFAULT_MAX_SCALE_FACTOR,
            min_scale_factor: DEFAULT_MIN_SCALE_FACTOR,
        }
    }
}

impl PlayerConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Sink buffer multipliers in the order they are tried: halving from the
    /// maximum while still at or above the minimum.
    pub fn scale_factors(&self) -> impl Iterator<Item = u32> {
        let min = self.min_scale_factor.max(1);
        std::iter::successors(Some(self.max_scale_factor), |factor| Some(factor / 2))
            .take_while(move |factor| *factor >= min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.read_timeout(), Duration::from_millis(5000));
        assert_eq!(config.buffer_capacity, 10240);
    }

    #[test]
    fn test_scale_factor_sequence() {
        let factors: Vec<u32> = PlayerConfig::default().scale_factors().collect();
        assert_eq!(factors, vec![200, 100, 50, 25, 12]);
    }

    #[test]
    fn test_scale_factors_empty_when_max_below_min() {
        let config = PlayerConfig {
            max_scale_factor: 5,
            ..PlayerConfig::default()
        };
        assert_eq!(config.scale_factors().count(), 0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PlayerConfig = serde_json::from_str(r#"{"read_timeout_ms": 750}"#).unwrap();
        assert_eq!(config.read_timeout_ms, 750);
        assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert_eq!(config.max_scale_factor, DEFAULT_MAX_SCALE_FACTOR);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(PlayerConfig::load(Path::new("/nonexistent/player.json")).is_err());
    }
}
