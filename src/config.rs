use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from review-metrics.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct MetricsConfig {
    pub github: GithubConfig,
    pub process: ProcessConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub repo: String,
    pub workflow: String,
    pub days: i64,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub parallelism: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
}

// --- Default implementations ---

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            workflow: "Claude Auto Review with Tracking".to_string(),
            days: 30,
            limit: 1000,
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            parallelism: crate::process::DEFAULT_PARALLELISM,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("claude_review_report.csv"),
            json_path: PathBuf::from("claude_metrics_output.json"),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl MetricsConfig {
    /// Load from a TOML file. A missing file yields defaults; a present but
    /// unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
