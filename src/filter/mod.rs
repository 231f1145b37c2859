// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The filtering orchestrator.
//!
//! A [`ResponseFilter`] is built once from a [`FilterConfig`] and shared
//! across requests – the "given a configured rule set, produce a
//! response-decorator factory" adapter that lets the core sit behind any
//! server's middleware convention.  Per request, [`ResponseFilter::intercept`]
//! installs an [`Interceptor`] in front of the real sink; after the
//! downstream handler has finished writing through it,
//! [`ResponseFilter::finish`] runs the rewrite pass and emits the final
//! bytes.


use http::HeaderValue;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use log::{debug, warn};
use std::sync::Arc;

use crate::codec::{self, Decoded};
use crate::config::{ConfigError, FilterConfig};
use crate::core::{FilterError, FilterRequest};
use crate::interceptor::{Interceptor, ResponseSink};
use crate::rule::RuleSet;

/// Orchestrates interception, rule matching, transcoding and the final
/// write for every response.
#[derive(Debug, Clone)]
pub struct ResponseFilter {
    rules: Arc<RuleSet>,
    max_buffer_size: Option<usize>,
}

impl ResponseFilter {
    /// Compile the configuration into a shareable filter.
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigError> {
        let rules = RuleSet::from_config(config)?;
        let max_buffer_size = usize::try_from(config.max_buffer_size).ok();
        Ok(Self {
            rules: Arc::new(rules),
            max_buffer_size,
        })
    }

    /// Build a filter from an already compiled rule set.  `None` for
    /// `max_buffer_size` means unbounded buffering.
    pub fn from_rules(rules: RuleSet, max_buffer_size: Option<usize>) -> Self {
        Self {
            rules: Arc::new(rules),
            max_buffer_size,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Install the response decorator for one request.  The downstream
    /// handler writes status, headers and body through the returned
    /// interceptor as if it were the real sink.
    pub fn intercept<S: ResponseSink>(&self, request: FilterRequest, sink: S) -> Interceptor<S> {
        Interceptor::new(
            sink,
            request,
            Arc::clone(&self.rules),
            self.max_buffer_size,
        )
    }

    /// Complete the response after the downstream handler returned.
    ///
    /// `upstream` is the handler's own result.  Any upstream error aborts
    /// filtering and is surfaced verbatim – except
    /// [`FilterError::UpstreamLog`], the diagnostic channel, which still
    /// counts as a successful write: rewriting runs to completion and the
    /// captured error is returned afterwards.
    pub async fn finish<S: ResponseSink>(
        &self,
        interceptor: &mut Interceptor<S>,
        upstream: Result<(), FilterError>,
    ) -> Result<(), FilterError> {
        let mut deferred = None;
        if let Err(error) = upstream {
            match error {
                FilterError::UpstreamLog(_) => deferred = Some(error),
                other => return Err(other),
            }
        }

        if !interceptor.body_allowed() || !interceptor.was_recorded() {
            interceptor.ensure_committed().await?;
            return match deferred {
                Some(error) => Err(error),
                None => Ok(()),
            };
        }

        // Body retrieval and decoding are lazy: rules are re-matched
        // against the now-final headers, and nothing is decoded until the
        // first rule actually applies.
        let mut body: Option<Vec<u8>> = None;
        let mut reencode = false;
        let mut decode_failed = false;
        for rule in self.rules.iter() {
            if !rule.matches(interceptor.request(), interceptor.headers()) {
                continue;
            }
            if body.is_none() && !decode_failed {
                match codec::decode(interceptor.headers(), interceptor.recorded()) {
                    Decoded::Plain(raw) => body = Some(raw),
                    Decoded::Gzip(plaintext) => {
                        body = Some(plaintext);
                        reencode = true;
                        interceptor.headers_mut().remove(CONTENT_ENCODING);
                    }
                    Decoded::Failed => {
                        warn!(
                            "malformed gzip stream for {}; passing body through unmodified",
                            interceptor.request().path
                        );
                        decode_failed = true;
                        break;
                    }
                }
            }
            if let Some(current) = body.take() {
                body = Some(rule.execute(
                    interceptor.request(),
                    interceptor.headers(),
                    &current,
                ));
            }
        }

        let rewritten = body.is_some();
        let output = match body {
            // No rule applied against the final headers, or the body
            // could not be decoded: the recorded bytes stand as-is.
            None => interceptor.recorded().to_vec(),
            Some(new_body) => {
                debug!(
                    "rewrote {} recorded bytes into {} for {}",
                    interceptor.recorded().len(),
                    new_body.len(),
                    interceptor.request().path
                );
                if reencode {
                    let encoded = codec::encode(&new_body)?;
                    interceptor
                        .headers_mut()
                        .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                    encoded
                } else {
                    new_body
                }
            }
        };

        // Correct the framing only where framing was declared.
        if rewritten && interceptor.headers().contains_key(CONTENT_LENGTH) {
            interceptor
                .headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(output.len()));
        }

        let written = interceptor.write_through(&output).await?;
        if written < output.len() {
            return Err(FilterError::ShortWrite {
                written,
                expected: output.len(),
            });
        }

        match deferred {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
