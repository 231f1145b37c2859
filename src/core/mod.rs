// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives – the request record and the crate error type.
//!
//! Everything that physically moves through the filtering pipeline is
//! defined in this module.  No rewriting logic lives here; that sits in
//! `interceptor` (state machine), `rule`/`template` (behaviour) and
//! `filter` (orchestration).


use http::{HeaderMap, Method};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while a response passes through the filter.
#[derive(Error, Debug)]
pub enum FilterError {
    /// IO error from the real sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Status and headers were committed to the sink a second time.
    /// This always indicates a violated buffering/streaming state machine.
    #[error("headers were already committed to the client")]
    HeadersAlreadySent,

    /// The sink accepted fewer bytes than supplied on the final write
    #[error("short write: sink accepted {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Diagnostic log output carried through the upstream error channel.
    /// The write that produced it still counts as successful; the
    /// orchestrator defers this error until rewriting has finished.
    #[error("upstream log output: {0}")]
    UpstreamLog(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// The inbound request as seen by rule predicates and replacement
/// placeholders.  A plain data record; the host server fills it in once
/// per request.
#[derive(Debug, Clone)]
pub struct FilterRequest {
    pub method: Method,
    pub url: String,
    pub path: String,
    pub host: String,
    pub proto: String,
    pub scheme: String,
    pub remote_addr: String,
    pub headers: HeaderMap,
}

impl FilterRequest {
    /// Minimal request for the given path; a host server usually
    /// populates every field instead.
    pub fn for_path(path: &str) -> Self {
        Self {
            method: Method::GET,
            url: path.to_string(),
            path: path.to_string(),
            host: String::new(),
            proto: String::new(),
            scheme: String::new(),
            remote_addr: String::new(),
            headers: HeaderMap::new(),
        }
    }
}
