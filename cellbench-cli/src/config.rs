//! Configuration loading from cellbench.toml
//!
//! Configuration can be specified in a `cellbench.toml` file in the project
//! root. The file is discovered by walking up from the current directory;
//! every field has a default, and command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up by [`CellConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "cellbench.toml";

/// cellbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CellConfig {
    /// Input data configuration
    #[serde(default)]
    pub data: DataConfig,
    /// Executor configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Measurement CSV file
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    /// Rows per chunk
    #[serde(default = "default_chunksize")]
    pub chunksize: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            chunksize: default_chunksize(),
        }
    }
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("data/cells.csv")
}
fn default_chunksize() -> usize {
    5000
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Thread pool size of the thread-parallel strategy
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Worker process count of the process-parallel strategy (default: available CPUs)
    #[serde(default)]
    pub processes: Option<usize>,
    /// Binary spawned as worker process (default: the running executable)
    #[serde(default)]
    pub worker_binary: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            processes: None,
            worker_binary: None,
        }
    }
}

fn default_threads() -> usize {
    4
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl CellConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("ignoring {}: {}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# cellbench configuration

[data]
# Measurement CSV: CellId plus volume and surface-area columns
csv_path = "data/cells.csv"
# Rows per chunk
chunksize = 5000

[runner]
# Thread pool size for the thread-parallel strategy
threads = 4
# Worker processes for the process-parallel strategy (default: available CPUs)
# processes = 8
# Binary spawned as worker process (default: this executable)
# worker_binary = "target/release/cellbench"

[output]
# Default output format: human or json
format = "human"
"#
        .to_string()
    }
}
