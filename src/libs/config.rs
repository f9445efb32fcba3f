//! Migration configuration, loaded from / saved to the working
//! directory's `config.json`.
//!
//! Modeled on the familiar `Config::read`/`save` pattern: a single
//! `serde`-derived struct round-tripped as pretty JSON, with a
//! `Default` that lets the CLI run against the in-memory backend with
//! no file present at all.

use crate::core::fkr::policy::OrphanPolicy;
use crate::core::monitor::AutoRollbackThresholds;
use crate::core::rbm::RollbackMode;
use crate::libs::data_storage::WorkingDirectory;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    BlueGreen,
    Rolling,
    MaintenanceWindow,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::BlueGreen
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue-green" => Ok(Strategy::BlueGreen),
            "rolling" => Ok(Strategy::Rolling),
            "maintenance-window" => Ok(Strategy::MaintenanceWindow),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::BlueGreen => write!(f, "blue-green"),
            Strategy::Rolling => write!(f, "rolling"),
            Strategy::MaintenanceWindow => write!(f, "maintenance-window"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficSwitchingMode {
    Immediate,
    Progressive,
}

impl Default for TrafficSwitchingMode {
    fn default() -> Self {
        TrafficSwitchingMode::Progressive
    }
}

impl std::str::FromStr for TrafficSwitchingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(TrafficSwitchingMode::Immediate),
            "progressive" => Ok(TrafficSwitchingMode::Progressive),
            other => Err(format!("unknown traffic switching mode: {other}")),
        }
    }
}

impl std::fmt::Display for TrafficSwitchingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficSwitchingMode::Immediate => write!(f, "immediate"),
            TrafficSwitchingMode::Progressive => write!(f, "progressive"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AutoRollbackThresholdsConfig {
    pub error_rate_pct: f64,
    pub response_time_ms: u64,
    pub consistency_pct: f64,
}

impl Default for AutoRollbackThresholdsConfig {
    fn default() -> Self {
        Self {
            error_rate_pct: 5.0,
            response_time_ms: 2000,
            consistency_pct: 95.0,
        }
    }
}

impl From<AutoRollbackThresholdsConfig> for AutoRollbackThresholds {
    fn from(c: AutoRollbackThresholdsConfig) -> Self {
        AutoRollbackThresholds {
            error_rate_pct: c.error_rate_pct,
            response_time_ms: c.response_time_ms,
            consistency_pct: c.consistency_pct,
        }
    }
}

/// Every tunable the migration lifecycle needs, plus the ambient keys
/// a real orchestrator needs (monitor poll interval, fan-out, batch
/// size, per-call timeout) that the component design assumes exist
/// but leaves unnamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub strategy: Strategy,
    pub traffic_switching: TrafficSwitchingMode,
    pub progressive_steps: Vec<u8>,
    pub downtime_window_ms: u64,
    pub auto_rollback_thresholds: AutoRollbackThresholdsConfig,
    pub orphan_policy: OrphanPolicy,
    pub enable_incremental_sync: bool,
    pub sync_interval_ms: u64,
    pub step_observation_ms: u64,
    pub recovery_window_ms: u64,
    pub rollback_mode: RollbackMode,
    pub create_backup_before_rollback: bool,
    pub confirm_rollback: bool,

    /// Ambient — how often the monitor polls both data planes.
    pub monitor_poll_interval_ms: u64,
    /// Ambient — bulk read/write page size.
    pub batch_size: usize,
    /// Ambient — bounded fan-out for concurrent per-table DPA work.
    pub concurrent_workers: usize,
    /// Ambient — per-call DPA timeout.
    pub dpa_timeout_ms: u64,
    /// Ambient — extended stability observation window for the
    /// `verification` phase.
    pub verification_stability_window_ms: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            traffic_switching: TrafficSwitchingMode::default(),
            progressive_steps: vec![10, 25, 50, 75, 100],
            downtime_window_ms: 30 * 60 * 1000,
            auto_rollback_thresholds: AutoRollbackThresholdsConfig::default(),
            orphan_policy: OrphanPolicy::Warn,
            enable_incremental_sync: true,
            sync_interval_ms: 5000,
            step_observation_ms: 2000,
            recovery_window_ms: 5000,
            rollback_mode: RollbackMode::Full,
            create_backup_before_rollback: true,
            confirm_rollback: true,
            monitor_poll_interval_ms: 1000,
            batch_size: 500,
            concurrent_workers: 4,
            dpa_timeout_ms: 10_000,
            verification_stability_window_ms: 10_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("writing config file failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("config file is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("progressive_steps must be non-empty when traffic_switching = progressive")]
    EmptyProgressiveSteps,
    #[error("progressive_steps must be strictly increasing")]
    ProgressiveStepsNotIncreasing,
    #[error("progressive_steps must end at 100")]
    ProgressiveStepsMustEndAt100,
    #[error("progressive_steps entries must be in 0..=100")]
    ProgressiveStepOutOfRange,
}

impl MigrationConfig {
    pub async fn load(working_dir: &WorkingDirectory) -> Result<Self, ConfigError> {
        let path = working_dir.config_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Read(err)),
        }
    }

    pub async fn save(&self, working_dir: &WorkingDirectory) -> Result<(), ConfigError> {
        working_dir.ensure_root().await.map_err(ConfigError::Write)?;
        let json = serde_json::to_vec_pretty(self).map_err(ConfigError::Parse)?;
        tokio::fs::write(working_dir.config_path(), json).await.map_err(ConfigError::Write)
    }

    /// Rejects configurations that cannot legally drive the phase
    /// engine, independent of any I/O error. Surfaces as the CLI's
    /// exit code 3 ("invalid configuration").
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.traffic_switching == TrafficSwitchingMode::Progressive {
            if self.progressive_steps.is_empty() {
                return Err(ConfigError::EmptyProgressiveSteps);
            }
            if self.progressive_steps.last() != Some(&100) {
                return Err(ConfigError::ProgressiveStepsMustEndAt100);
            }
            if self.progressive_steps.iter().any(|&p| p > 100) {
                return Err(ConfigError::ProgressiveStepOutOfRange);
            }
            if !self.progressive_steps.windows(2).all(|w| w[0] < w[1]) {
                return Err(ConfigError::ProgressiveStepsNotIncreasing);
            }
        }
        Ok(())
    }

    pub fn auto_rollback_thresholds(&self) -> AutoRollbackThresholds {
        self.auto_rollback_thresholds.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        assert!(MigrationConfig::default().validate().is_ok());
    }

    #[test]
    fn progressive_steps_must_end_at_100() {
        let config = MigrationConfig {
            progressive_steps: vec![10, 50],
            ..MigrationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ProgressiveStepsMustEndAt100)));
    }

    #[test]
    fn progressive_steps_must_be_strictly_increasing() {
        let config = MigrationConfig {
            progressive_steps: vec![10, 10, 100],
            ..MigrationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ProgressiveStepsNotIncreasing)));
    }

    #[test]
    fn single_step_schedule_is_valid_and_equivalent_to_immediate() {
        let config = MigrationConfig {
            progressive_steps: vec![100],
            ..MigrationConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn round_trips_through_the_working_directory() {
        let dir = tempdir().unwrap();
        let wd = WorkingDirectory::new(dir.path());
        let config = MigrationConfig {
            sync_interval_ms: 12345,
            ..MigrationConfig::default()
        };
        config.save(&wd).await.unwrap();
        let loaded = MigrationConfig::load(&wd).await.unwrap();
        assert_eq!(loaded.sync_interval_ms, 12345);
    }

    #[tokio::test]
    async fn loading_with_no_file_present_returns_defaults() {
        let dir = tempdir().unwrap();
        let wd = WorkingDirectory::new(dir.path());
        let loaded = MigrationConfig::load(&wd).await.unwrap();
        assert_eq!(loaded.batch_size, MigrationConfig::default().batch_size);
    }
}
