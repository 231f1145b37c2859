// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The response interceptor.
//!
//! An [`Interceptor`] sits between a downstream response producer and the
//! real [`ResponseSink`], exposing the same receive-status /
//! receive-headers / receive-body contract so it can be substituted
//! transparently.  On the first non-empty body chunk it decides, exactly
//! once, whether to buffer (some rule matches the request/response pair)
//! or to stream.  Buffering is bounded: crossing the configured ceiling
//! flushes everything and irrevocably degrades to streaming, so memory
//! never exceeds the ceiling and a response sees at most one overflow.

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use bytes::BytesMut;
use http::{HeaderMap, StatusCode};
use std::mem;
use std::sync::Arc;

use crate::core::{FilterError, FilterRequest};
use crate::rule::RuleSet;

/// The real response sink a host server implements once.
///
/// `send_headers` commits status and headers, exactly once per response;
/// `send_body` writes a chunk and reports how many bytes were accepted.
#[async_trait]
pub trait ResponseSink: Send {
    async fn send_headers(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> Result<(), FilterError>;

    async fn send_body(&mut self, chunk: &[u8]) -> Result<usize, FilterError>;
}

/// Whether a response with this status may carry a body.
/// False for all of 1xx, 204 and 304.
pub fn body_allowed_for_status(status: StatusCode) -> bool {
    match status.as_u16() {
        100..=199 => false,
        204 => false,
        304 => false,
        _ => true,
    }
}

/// Buffering decision, made once on first body write.  The buffer only
/// exists while buffering, which makes the overflow transition's
/// irrevocability structural.
#[derive(Debug)]
enum Mode {
    Undecided,
    Buffering(BytesMut),
    Streaming,
}

/// The streaming response decorator.  One per request; owns the response
/// state exclusively for the request's lifetime.
#[derive(Debug)]
pub struct Interceptor<S: ResponseSink> {
    sink: S,
    request: FilterRequest,
    rules: Arc<RuleSet>,
    headers: HeaderMap,
    status: StatusCode,
    body_allowed: bool,
    headers_sent: bool,
    mode: Mode,
    max_buffer_size: Option<usize>,
}

impl<S: ResponseSink> Interceptor<S> {
    pub(crate) fn new(
        sink: S,
        request: FilterRequest,
        rules: Arc<RuleSet>,
        max_buffer_size: Option<usize>,
    ) -> Self {
        Self {
            sink,
            request,
            rules,
            headers: HeaderMap::new(),
            status: StatusCode::OK,
            body_allowed: true,
            headers_sent: false,
            mode: Mode::Undecided,
            max_buffer_size,
        }
    }

    /// Record the response status.  Nothing is forwarded yet; the status
    /// reaches the sink when headers are committed.
    pub fn set_status(&mut self, status: StatusCode) {
        self.body_allowed = body_allowed_for_status(status);
        self.status = status;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the last recorded status permits a body.
    pub fn body_allowed(&self) -> bool {
        self.body_allowed
    }

    /// The response headers, mutable by the wrapped producer at any point
    /// before the first body write.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn request(&self) -> &FilterRequest {
        &self.request
    }

    /// Receive a body chunk from the downstream producer.
    ///
    /// The first non-empty chunk triggers the buffer-or-stream decision:
    /// buffering iff any rule matches the request with headers as
    /// currently set.  Returns the number of bytes accepted.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<usize, FilterError> {
        if chunk.is_empty() {
            return Ok(0);
        }

        if matches!(self.mode, Mode::Undecided) {
            self.mode = if self.rules.any_match(&self.request, &self.headers) {
                Mode::Buffering(BytesMut::new())
            } else {
                Mode::Streaming
            };
        }

        if matches!(self.mode, Mode::Streaming) {
            self.ensure_committed().await?;
            return self.sink.send_body(chunk).await;
        }

        let overflows = match &self.mode {
            Mode::Buffering(buffer) => self
                .max_buffer_size
                .is_some_and(|max| buffer.len() + chunk.len() > max),
            _ => unreachable!("mode was decided above"),
        };

        if overflows {
            // Overflow: flush headers plus everything buffered so far and
            // degrade to plain streaming for the rest of the response.
            let Mode::Buffering(buffer) = mem::replace(&mut self.mode, Mode::Streaming) else {
                unreachable!("mode was decided above");
            };
            self.ensure_committed().await?;
            self.sink.send_body(&buffer).await?;
            return self.sink.send_body(chunk).await;
        }

        let Mode::Buffering(buffer) = &mut self.mode else {
            unreachable!("mode was decided above");
        };
        buffer.extend_from_slice(chunk);
        Ok(chunk.len())
    }

    /// True iff body bytes are being held back for the rewrite pass.
    pub fn was_recorded(&self) -> bool {
        match &self.mode {
            Mode::Buffering(buffer) => !buffer.is_empty(),
            _ => false,
        }
    }

    /// The buffered body bytes; empty when nothing was recorded.
    pub fn recorded(&self) -> &[u8] {
        match &self.mode {
            Mode::Buffering(buffer) => buffer,
            _ => &[],
        }
    }

    /// Commit status and headers to the sink.  Committing twice is a
    /// state-machine violation and fails loudly.
    pub async fn commit_headers(&mut self) -> Result<(), FilterError> {
        if self.headers_sent {
            return Err(FilterError::HeadersAlreadySent);
        }
        self.sink.send_headers(self.status, &self.headers).await?;
        self.headers_sent = true;
        Ok(())
    }

    /// Commit status and headers unless they already went out.
    pub async fn ensure_committed(&mut self) -> Result<(), FilterError> {
        if self.headers_sent {
            return Ok(());
        }
        self.commit_headers().await
    }

    pub fn headers_committed(&self) -> bool {
        self.headers_sent
    }

    /// Commit headers if needed, then write `body` to the sink.  Used by
    /// the orchestrator for the single final write.
    pub(crate) async fn write_through(&mut self, body: &[u8]) -> Result<usize, FilterError> {
        self.ensure_committed().await?;
        self.sink.send_body(body).await
    }

    /// Tear down the decorator, returning the wrapped sink.
    pub fn into_inner(self) -> S {
        self.sink
    }
}
