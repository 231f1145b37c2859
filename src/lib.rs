// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Refilter - a configuration-driven HTTP response rewriting library
//!
//! Refilter intercepts an outgoing HTTP response, conditionally buffers
//! its body and rewrites matching byte ranges with regex-driven,
//! template-based substitution before the bytes reach the client.  It is
//! deliberately server-agnostic: the host server implements the
//! [`ResponseSink`] contract once, and the core slots in as a
//! pass-through decorator in front of any downstream handler.
//!
//! # Core Principles
//!
//! - **Lazy buffering**: whether to buffer at all is decided on the first
//!   body write, so responses no rule applies to keep streaming.
//! - **Bounded memory**: crossing the configured buffer ceiling flushes
//!   and irrevocably degrades to streaming; at most one overflow per
//!   response.
//! - **Transparent transcoding**: gzip bodies are decoded for the text
//!   rules and re-encoded before reaching the client.
//! - **Immutable configuration**: rules are validated and compiled once
//!   at startup and shared read-only across all requests.
//!
//! # Usage
//!
//! ```rust,no_run
//! use refilter::{FilterConfig, FilterRequest, ResponseFilter};
//!
//! # async fn example(sink: impl refilter::ResponseSink) -> Result<(), refilter::FilterError> {
//! let config = FilterConfig::from_file("filter.yaml")?;
//! let filter = ResponseFilter::new(&config)?;
//!
//! // Per request: wrap the real sink, let the downstream handler write
//! // through the interceptor, then run the rewrite pass.
//! let request = FilterRequest::for_path("/index.html");
//! let mut interceptor = filter.intercept(request, sink);
//! let upstream = interceptor.write(b"Hello world!").await.map(|_| ());
//! filter.finish(&mut interceptor, upstream).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Replacement templates
//!
//! A rule's replacement may reference regex capture groups (`{1}`) and
//! contextual values (`{request_path}`, `{response_header_Last-Modified:unix}`,
//! `{now}`, `{env_HOME}`, ...) via `{...}` placeholders; unresolved
//! placeholders are left verbatim.  See the `template` module
//! documentation for the full namespace.

// Module declarations
pub mod codec;
pub mod config;
pub mod core;
pub mod filter;
pub mod interceptor;
pub mod logging;
pub mod rule;
mod template;

// Re-export key types at the crate root for convenience
pub use config::{ConfigError, FileFormat, FilterConfig, RuleConfig};
pub use core::{FilterError, FilterRequest};
pub use filter::ResponseFilter;
pub use interceptor::{Interceptor, ResponseSink, body_allowed_for_status};
pub use rule::{Combination, Rule, RuleSet};
