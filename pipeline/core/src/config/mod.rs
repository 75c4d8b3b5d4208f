pub mod constants;

use crate::{
    coords::Point3,
    errors::config::{ConfigError, ConfigResult},
};
use constants::{DEFAULT_BLOCK_SIZE, DEFAULT_CORE_PADDING, DEFAULT_CORE_SIZE, DEFAULT_MAX_ROUNDS};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Reconstruction configuration, usually read from a TOML file with kebab-case keys:
///
/// ```toml
/// volume-size = [1024, 1024, 64]
/// block-size = [256, 256, 16]
/// core-size = [2, 2, 2]
/// core-padding = 2
/// feature-weights = [0.0, 1.2, 0.0, 2.0, -3.5, 1.0, 0.1]
/// solve-time-budget-ms = 60000
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Size of the whole volume in voxels
    pub volume_size: Point3,

    /// Size of one block in voxels
    pub block_size: Point3,

    /// Size of one core in blocks
    pub core_size: Point3,

    /// Halo blocks added around a core in all six directions before solving
    pub core_padding: u32,

    /// Require every conflict set to be explained by exactly one chosen link
    pub force_explanation: bool,

    /// Weights dotted with link feature vectors to obtain link costs
    pub feature_weights: Vec<f64>,

    /// Upper bound on a single solver invocation
    pub solve_time_budget_ms: Option<u64>,

    /// Reuse link costs persisted by an earlier solve
    pub read_costs: bool,

    /// Persist link costs after solving
    pub store_costs: bool,

    /// Bound on solution/link/region rounds per core
    pub max_rounds: usize,

    /// Worker threads for sections and cores. Zero means one per CPU
    pub num_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            volume_size: Point3::ZERO,
            block_size: DEFAULT_BLOCK_SIZE,
            core_size: DEFAULT_CORE_SIZE,
            core_padding: DEFAULT_CORE_PADDING,
            force_explanation: false,
            feature_weights: vec![],
            solve_time_budget_ms: None,
            read_costs: false,
            store_costs: false,
            max_rounds: DEFAULT_MAX_ROUNDS,
            num_threads: 0,
        }
    }
}

impl Config {
    pub fn new(volume_size: Point3, block_size: Point3, core_size: Point3) -> Self {
        Self { volume_size, block_size, core_size, ..Default::default() }
    }

    pub fn from_toml_str(toml_str: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let toml_str =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_toml_str(&toml_str)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.volume_size.has_zero() {
            return Err(ConfigError::ZeroVolume(self.volume_size));
        }
        if self.block_size.has_zero() {
            return Err(ConfigError::ZeroBlockSize(self.block_size));
        }
        if self.core_size.has_zero() {
            return Err(ConfigError::ZeroCoreSize(self.core_size));
        }
        if self.core_padding == 0 {
            return Err(ConfigError::ZeroCorePadding);
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        Ok(())
    }

    pub fn solve_time_budget(&self) -> Option<Duration> {
        self.solve_time_budget_ms.map(Duration::from_millis)
    }

    pub fn with_core_padding(mut self, core_padding: u32) -> Self {
        self.core_padding = core_padding;
        self
    }

    pub fn with_feature_weights(mut self, feature_weights: Vec<f64>) -> Self {
        self.feature_weights = feature_weights;
        self
    }

    pub fn with_force_explanation(mut self, force_explanation: bool) -> Self {
        self.force_explanation = force_explanation;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_with_defaults() {
        let config = Config::from_toml_str(
            r#"
            volume-size = [100, 100, 10]
            block-size = [50, 50, 10]
            feature-weights = [1.0, -2.5]
            solve-time-budget-ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.volume_size, Point3::new(100, 100, 10));
        assert_eq!(config.block_size, Point3::new(50, 50, 10));
        assert_eq!(config.core_size, DEFAULT_CORE_SIZE);
        assert_eq!(config.core_padding, DEFAULT_CORE_PADDING);
        assert!(!config.force_explanation);
        assert_eq!(config.feature_weights, vec![1.0, -2.5]);
        assert_eq!(config.solve_time_budget(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_rejects_unknown_and_invalid() {
        assert!(matches!(Config::from_toml_str("volume-size = [1, 1, 1]\nblock-szie = [1, 1, 1]"), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::from_toml_str("block-size = [1, 1, 1]"), Err(ConfigError::ZeroVolume(_))));
        assert!(matches!(
            Config::from_toml_str("volume-size = [1, 1, 1]\ncore-padding = 0"),
            Err(ConfigError::ZeroCorePadding)
        ));
        assert!(matches!(Config::from_toml_str("volume-size = [1, 1, 1]\ncore-size = [1, 0, 1]"), Err(ConfigError::ZeroCoreSize(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "volume-size = [64, 64, 8]\nforce-explanation = true\nmax-rounds = 3").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(config.force_explanation);
        assert_eq!(config.max_rounds, 3);
        assert!(matches!(Config::load("/nonexistent/blockwise.toml"), Err(ConfigError::Io { .. })));
    }
}
