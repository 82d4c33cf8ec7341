use recsim_core::model::instance::{InstanceRows, ProblemInstance};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_EPISODES: usize = 10_000;
const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root batch configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    pub run_id: String,
    #[serde(default)]
    pub trials: TrialConfig,
    pub instances: Vec<InstanceConfig>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchmarkConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchmarkConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.trials.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.metrics.validate()?;
        self.logging.normalize();
        validate_instances(&self.instances)?;
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            plots_dir: resolve_template(&self.run_id, &self.outputs.plots_dir),
        }
    }
}

/// Episode count and seeding.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrialConfig {
    #[serde(default = "default_episodes")]
    pub episodes: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            episodes: DEFAULT_EPISODES,
            seed: None,
        }
    }
}

impl TrialConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.episodes == 0 {
            return Err(ValidationError::InvalidField {
                field: "trials.episodes".to_string(),
                message: "number of episodes must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_episodes() -> usize {
    DEFAULT_EPISODES
}

/// A named problem instance: like matrix, survival matrix and prior.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InstanceConfig {
    pub name: String,
    #[serde(flatten)]
    pub rows: InstanceRows,
}

impl InstanceConfig {
    pub fn build(&self) -> Result<ProblemInstance, ValidationError> {
        ProblemInstance::from_rows(&self.rows).map_err(|err| ValidationError::InvalidField {
            field: format!("instances[{}]", self.name),
            message: err.to_string(),
        })
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    pub plots_dir: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
            ("outputs.plots_dir", &self.plots_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Summary statistics configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

impl MetricsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ValidationError::InvalidField {
                field: "metrics.confidence_level".to_string(),
                message: "confidence level must lie strictly between 0 and 1".to_string(),
            });
        }
        Ok(())
    }
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default)]
    pub episode_details: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
            episode_details: false,
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_instances(instances: &[InstanceConfig]) -> Result<(), ValidationError> {
    if instances.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "instances".to_string(),
            message: "at least one instance must be specified".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for instance in instances {
        if instance.name.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "instances.name".to_string(),
                message: "instance name must not be empty".to_string(),
            });
        }

        if !instance.name.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
            return Err(ValidationError::InvalidField {
                field: format!("instances[{}].name", instance.name),
                message: "instance name contains invalid characters".to_string(),
            });
        }

        if !seen.insert(instance.name.clone()) {
            return Err(ValidationError::InvalidField {
                field: "instances".to_string(),
                message: format!("instance name '{}' defined more than once", instance.name),
            });
        }

        instance.build()?;
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub plots_dir: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
