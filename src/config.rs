use crate::analyzer::GatherOptions;
use crate::error::{ReconcileError, Result};
use crate::matcher::{ScoringWeights, SelectionPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run configuration
///
/// The numeric constants are calibration values, not fixed truth: tune them
/// against a labeled set of product/image pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Minimum score of the best alternative image
    pub acceptance_threshold: f64,
    /// Minimum lead of the best alternative over the current image
    pub min_margin: f64,
    /// Bound on in-flight provider requests
    pub max_concurrent_analysis: usize,
    pub provider_timeout_ms: u64,
    /// Retries of a transient provider failure before the image is unavailable
    pub retry_budget: u32,
    pub retry_backoff_ms: u64,
    /// Cancel evidence gathering as soon as one image becomes unavailable
    pub abort_on_unavailable: bool,
    /// Prefix for new image refs of products that have none
    pub image_ref_prefix: Option<String>,
    pub weights: ScoringWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.5,
            min_margin: 0.1,
            max_concurrent_analysis: 4,
            provider_timeout_ms: 120_000,
            retry_budget: 2,
            retry_backoff_ms: 500,
            abort_on_unavailable: false,
            image_ref_prefix: None,
            weights: ScoringWeights::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ReconcileError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("catalog-reconcile").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(ReconcileError::Config(format!(
                "acceptanceThreshold must be within [0, 1], got {}",
                self.acceptance_threshold
            )));
        }
        if self.min_margin < 0.0 || self.min_margin.is_nan() {
            return Err(ReconcileError::Config(format!(
                "minMargin must not be negative, got {}",
                self.min_margin
            )));
        }
        if self.max_concurrent_analysis == 0 {
            return Err(ReconcileError::Config("maxConcurrentAnalysis must be at least 1".into()));
        }
        if self.provider_timeout_ms == 0 {
            return Err(ReconcileError::Config("providerTimeoutMs must be positive".into()));
        }
        self.weights.validate().map_err(ReconcileError::Config)
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            acceptance_threshold: self.acceptance_threshold,
            min_margin: self.min_margin,
            image_ref_prefix: self.image_ref_prefix.clone(),
        }
    }

    pub fn gather_options(&self) -> GatherOptions {
        GatherOptions {
            max_concurrent: self.max_concurrent_analysis,
            timeout: Duration::from_millis(self.provider_timeout_ms),
            retry_budget: self.retry_budget,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            abort_on_unavailable: self.abort_on_unavailable,
            show_progress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"acceptanceThreshold": 0.6, "maxConcurrentAnalysis": 2}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.acceptance_threshold, 0.6);
        assert_eq!(config.max_concurrent_analysis, 2);
        assert_eq!(config.min_margin, 0.1);
        assert_eq!(config.provider_timeout_ms, 120_000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            min_margin: 0.2,
            image_ref_prefix: Some("/images/vendors/teva-deli".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            Config { acceptance_threshold: 1.5, ..Default::default() },
            Config { min_margin: -0.1, ..Default::default() },
            Config { max_concurrent_analysis: 0, ..Default::default() },
            Config { provider_timeout_ms: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ReconcileError::Config(_))));
        }
    }

    #[test]
    fn test_gather_options_from_config() {
        let config = Config {
            max_concurrent_analysis: 3,
            provider_timeout_ms: 2_000,
            ..Default::default()
        };
        let options = config.gather_options();
        assert_eq!(options.max_concurrent, 3);
        assert_eq!(options.timeout, Duration::from_secs(2));
        assert_eq!(options.retry_budget, 2);
    }
}
