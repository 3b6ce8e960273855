use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Two seed entries must always fit in the activity log.
const MIN_LOG_CAPACITY: usize = 2;

/// Simulator settings. Every field has a default, so a partial YAML file
/// (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Maximum number of retained activity log entries.
    pub log_capacity: usize,
    /// Delay applied before each pipeline phase unless the phase overrides it.
    pub phase_delay_ms: u64,
    /// Version the cluster starts at and rollbacks return to.
    pub baseline_version: String,
    pub app_name: String,
    pub replicas: usize,
    pub services: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_capacity: 50,
            phase_delay_ms: 800,
            baseline_version: "v1.0.0".into(),
            app_name: "web".into(),
            replicas: 3,
            services: vec!["web-svc".into()],
        }
    }
}

impl SimConfig {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config: {}", path.display()))
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SimConfig = serde_yaml::from_str(yaml).context("invalid config YAML")?;
        Ok(config.normalized())
    }

    /// Clamp values the engine cannot honour.
    pub fn normalized(mut self) -> Self {
        if self.log_capacity < MIN_LOG_CAPACITY {
            tracing::warn!(
                requested = self.log_capacity,
                "log_capacity too small, using {MIN_LOG_CAPACITY}"
            );
            self.log_capacity = MIN_LOG_CAPACITY;
        }
        if self.replicas == 0 {
            self.replicas = 1;
        }
        self
    }
}
