use std::{
    collections::BTreeMap,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::stats::DEFAULT_CONFIDENCE;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Unknown host address {0}, add it to the hosts table")]
    UnknownHost(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub hosts: HostLabels,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub plot: PlotSettings,
    #[serde(default)]
    pub audit: AuditSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: HostLabels::default(),
            confidence: DEFAULT_CONFIDENCE,
            plot: PlotSettings::default(),
            audit: AuditSettings::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            read_to_string(path).wrap_err(format!("Reading config {}", path.display()))?;
        serde_yml::from_str(&contents).wrap_err(format!("Parsing config {}", path.display()))
    }

    /// Like [`Config::load`], but falls back to the defaults when `path` does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

/// Host address to human readable server label, ie. `10.10.1.1 -> CA`
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostLabels(BTreeMap<String, String>);

impl HostLabels {
    pub fn label(&self, address: &str) -> Result<&str, ConfigError> {
        self.0
            .get(address)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownHost(address.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<A: Into<String>, L: Into<String>> FromIterator<(A, L)> for HostLabels {
    fn from_iter<T: IntoIterator<Item = (A, L)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(address, label)| (address.into(), label.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlotSettings {
    /// Directory holding the python renderers
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Open an interactive window in addition to saving the figure
    #[serde(default = "default_show")]
    pub show: bool,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            script_dir: default_script_dir(),
            output_dir: default_output_dir(),
            show: default_show(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSettings {
    /// Op-type token marking an "executed with result" log line
    #[serde(default = "default_executed_op")]
    pub executed_op: String,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            executed_op: default_executed_op(),
        }
    }
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_script_dir() -> PathBuf {
    PathBuf::from("plots")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("plots_out")
}

fn default_show() -> bool {
    true
}

fn default_executed_op() -> String {
    "2".to_owned()
}
