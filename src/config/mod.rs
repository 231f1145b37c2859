// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Filter configuration.
//!
//! A [`FilterConfig`] is a plain serde structure: a global buffer ceiling
//! plus an ordered list of [`RuleConfig`] entries.  It can be deserialized
//! from any serde source or loaded from a JSON, TOML or YAML file with
//! [`FilterConfig::from_file`] (format detected by extension).  Loading is
//! deliberately thin – all validation and regex compilation happens once,
//! in [`RuleSet::from_config`](crate::rule::RuleSet::from_config), never
//! at request time.

pub mod error;


pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::rule::Combination;

/// Default buffer ceiling: 10 MiB.
pub const DEFAULT_MAX_BUFFER_SIZE: i64 = 10 * 1024 * 1024;

/// Supported file formats for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// JSON format (.json)
    Json,
    /// TOML format (.toml)
    Toml,
    /// YAML format (.yaml, .yml)
    Yaml,
}

impl FileFormat {
    /// Detect the file format from the file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension().and_then(|ext| {
            let ext_str = ext.to_string_lossy().to_lowercase();
            match ext_str.as_str() {
                "json" => Some(FileFormat::Json),
                "toml" => Some(FileFormat::Toml),
                "yaml" | "yml" => Some(FileFormat::Yaml),
                _ => None,
            }
        })
    }
}

/// Top-level configuration for a response filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Maximum number of body bytes buffered per response while waiting
    /// for the rewrite pass.  A negative value means unbounded.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: i64,

    /// Rewrite rules, applied in declaration order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_max_buffer_size() -> i64 {
    DEFAULT_MAX_BUFFER_SIZE
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            rules: Vec::new(),
        }
    }
}

impl FilterConfig {
    /// Load a configuration from a JSON, TOML or YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = FileFormat::from_extension(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let content = fs::read_to_string(path)?;

        match format {
            FileFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(format!("invalid JSON: {e}"))),
            FileFormat::Toml => toml::from_str(&content)
                .map_err(|e| ConfigError::ParseError(format!("invalid TOML: {e}"))),
            FileFormat::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::ParseError(format!("invalid YAML: {e}"))),
        }
    }
}

/// One rewrite rule, as configured.
///
/// At least one of `path`/`content_type` and a `search_pattern` are
/// required; this is enforced when the rule is compiled.  `replacement`
/// may alternatively be loaded from `replacement_file`; an absent
/// replacement deletes every match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Regular expression over the request path.
    #[serde(default)]
    pub path: Option<String>,

    /// Regular expression over the response `Content-Type`.
    #[serde(default)]
    pub content_type: Option<String>,

    /// How `path` and `content_type` combine when both are present.
    #[serde(default)]
    pub path_content_type_combination: Combination,

    /// Regular expression defining what to find in the body.
    #[serde(default)]
    pub search_pattern: Option<String>,

    /// Replacement template; may reference capture groups and contextual
    /// values as `{...}` placeholders.
    #[serde(default)]
    pub replacement: Option<String>,

    /// Load the replacement template from this file instead.
    #[serde(default)]
    pub replacement_file: Option<PathBuf>,
}
