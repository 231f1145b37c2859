// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the configuration module.

use std::fmt;
use std::io;
use thiserror::Error;

/// Errors that can occur while loading or compiling a filter configuration.
///
/// All of these are fatal at startup; none of them can occur at request
/// time because rules are validated and compiled exactly once.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An IO error occurred (e.g., while reading a configuration or
    /// replacement file).
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// An error occurred while parsing or deserializing the configuration.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// The configuration file has an extension we cannot map to a format.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// A rule definition is invalid; `index` is its zero-based position
    /// in the configured rule list.
    #[error("rule #{index}: {message}")]
    RuleError { index: usize, message: String },
}

impl ConfigError {
    /// Create a new rule error for the rule at `index`.
    pub fn rule_error<M: fmt::Display>(index: usize, message: M) -> Self {
        Self::RuleError {
            index,
            message: message.to_string(),
        }
    }
}
