//! Engine registry configuration.
//!
//! Engines are declared in a TOML file, by default `engines.toml` in the
//! working directory:
//!
//! ```toml
//! pool_capacity = 4
//!
//! [engines.stockfish]
//! path = "/usr/bin/stockfish"
//! options = { Threads = "1", Hash = "256" }
//!
//! [engines.lc0]
//! path = "/opt/lc0/lc0"
//! args = ["--backend=eigen"]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use uci_driver::{EngineDefinition, DEFAULT_CAPACITY};

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One engine's launch settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineEntry {
    /// Path to the engine executable.
    pub path: PathBuf,
    /// Command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// UCI options applied after the handshake.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl EngineEntry {
    /// Builds the pool-facing engine definition.
    pub fn definition(&self) -> EngineDefinition {
        let mut definition = EngineDefinition::new(&self.path);
        for arg in &self.args {
            definition = definition.arg(arg);
        }
        for (name, value) in &self.options {
            definition = definition.option(name, value);
        }
        definition
    }
}

/// Analyzer configuration: pool size plus the engine registry.
#[derive(Debug, Deserialize, Default)]
pub struct AnalyzerConfig {
    /// Maximum number of concurrently checked-out engines.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
    /// Map of engine names to their launch settings.
    #[serde(default)]
    pub engines: HashMap<String, EngineEntry>,
}

fn default_pool_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl AnalyzerConfig {
    /// Loads the configuration from disk.
    ///
    /// A missing file yields the default (empty) configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }
}
