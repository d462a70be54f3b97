//! Configuration module for pixelflow
//!
//! A project file is a TOML document describing the output nodes to
//! initialise, plus process-wide runtime and logging settings:
//!
//! ```toml
//! name = "stage"
//!
//! [runtime]
//! frame_rate_hz = 30
//! serial_open_delay_ms = 200
//! network_connect_timeout_ms = 1000
//!
//! [logging]
//! filter = "info,pixelflow_rs=debug"
//!
//! [pattern]
//! kind = "chase"
//! width = 4
//! height = 2
//! bytes_per_module = 3
//!
//! [[nodes]]
//! id = 1
//! kind = "opc_multi_output"
//! config = { count = 2, address0 = "10.0.0.1:7890", address1 = "10.0.0.2", mapFlip = "h" }
//! ```
//!
//! # Default Location
//!
//! - **Linux**: `~/.config/dev.pixelflow.pixelflow-rs/project.toml`
//! - **macOS**: `~/Library/Application Support/dev.pixelflow.pixelflow-rs/project.toml`
//! - **Windows**: `%APPDATA%\dev.pixelflow.pixelflow-rs\project.toml`

use crate::backend::opc::DEFAULT_CONNECT_TIMEOUT;
use crate::backend::serial::DEFAULT_OPEN_DELAY;
use crate::error::{PixelFlowError, Result, ResultExt};
use crate::pattern::PatternKind;
use crate::pipeline::{NodeId, NodeType, OutputDefaults, RawConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.pixelflow.pixelflow-rs";

/// Project filename inside the config directory
pub const PROJECT_FILE_NAME: &str = "project.toml";

/// Default test pattern rate in Hz
pub const DEFAULT_FRAME_RATE_HZ: u32 = 30;

/// Default `tracing` filter directive
pub const DEFAULT_LOG_FILTER: &str = "info,pixelflow_rs=debug";

/// Get the platform config directory for pixelflow
pub fn app_config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Process-wide timing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Test pattern frames per second
    pub frame_rate_hz: u32,
    /// Wait before a serial port is opened
    pub serial_open_delay_ms: u64,
    /// Bound on connecting to an OPC server
    pub network_connect_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
            serial_open_delay_ms: DEFAULT_OPEN_DELAY.as_millis() as u64,
            network_connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl RuntimeConfig {
    pub fn output_defaults(&self) -> OutputDefaults {
        OutputDefaults {
            serial_open_delay: Duration::from_millis(self.serial_open_delay_ms),
            network_connect_timeout: Duration::from_millis(self.network_connect_timeout_ms),
        }
    }

    /// Time between two test pattern frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.frame_rate_hz.max(1)))
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub filter: String,
    /// Directory for daily rolling log files; stdout only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            directory: None,
        }
    }
}

/// Geometry of the built-in test pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub kind: PatternKind,
    pub width: u32,
    pub height: u32,
    /// Bytes in one module's frame
    pub bytes_per_module: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            kind: PatternKind::default(),
            width: 2,
            height: 2,
            bytes_per_module: 3,
        }
    }
}

/// One output node of the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    pub kind: NodeType,
    #[serde(default)]
    pub config: RawConfig,
}

impl NodeEntry {
    pub fn new(id: impl Into<NodeId>, kind: NodeType, config: RawConfig) -> Self {
        Self {
            id: id.into(),
            kind,
            config,
        }
    }
}

/// A complete project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFile {
    pub version: u32,
    pub name: String,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
    pub pattern: PatternConfig,
    pub nodes: Vec<NodeEntry>,
}

impl Default for ProjectFile {
    fn default() -> Self {
        Self {
            version: 1,
            name: "Untitled".to_string(),
            runtime: RuntimeConfig::default(),
            logging: LoggingConfig::default(),
            pattern: PatternConfig::default(),
            nodes: Vec::new(),
        }
    }
}

impl ProjectFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_node(mut self, node: NodeEntry) -> Self {
        self.nodes.push(node);
        self
    }

    /// Default project location in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        app_config_dir().map(|p| p.join(PROJECT_FILE_NAME))
    }

    /// Parse a project from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let project: ProjectFile = toml::from_str(content)?;
        project.validate()?;
        Ok(project)
    }

    /// Load a project file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project file {:?}", path))?;

        Self::from_toml(&content).with_context(|| format!("Project file {:?}", path))
    }

    /// Load a project file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load project, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save project file to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create project directory")?;
        }

        let content = toml::to_string_pretty(self)?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write project file {:?}", path))
    }

    /// Checks settings that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.frame_rate_hz == 0 {
            return Err(PixelFlowError::Config(
                "runtime.frame_rate_hz must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(PixelFlowError::Config(format!(
                    "node id {} is used more than once",
                    node.id
                )));
            }
        }
        Ok(())
    }
}
