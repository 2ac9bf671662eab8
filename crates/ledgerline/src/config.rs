//! Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the object store (the "bucket").
    pub storage_root: PathBuf,
    /// Spill key prefix for anonymous jobs.
    pub prefix: String,
    /// Spill key prefix for logged-in users' jobs.
    pub auth_prefix: String,
    /// Country override for date-locale detection.
    pub country: Option<String>,
    /// Page budget: pages beyond this are not processed.
    pub max_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("parser-uploads"),
            prefix: "bank-statements".to_string(),
            auth_prefix: "bank-statements-auth".to_string(),
            country: None,
            max_pages: 10,
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ParseError::stage("config", e.to_string()))
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The spill prefix to use for a given login state.
    pub fn spill_prefix(&self, is_logged_in: bool) -> &str {
        if is_logged_in {
            &self.auth_prefix
        } else {
            &self.prefix
        }
    }
}
