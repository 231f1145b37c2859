// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Replacement template expansion.
//!
//! A replacement template is a byte string containing `{...}` placeholder
//! tokens.  For every regex match a placeholder resolves, in order of
//! precedence, to a capture group (`{0}` is the whole match), a request
//! value (`{request_path}`, `{request_header_X}`, ...), a response header
//! (`{response_header_X}`, with `:format` time rendering for timestamp
//! headers), the current time (`{now}` / `{now:%Y-%m-%d}`) or an
//! environment variable (`{env_X}`).  A token that resolves to nothing is
//! left verbatim in the output, braces included; expansion is purely
//! textual and never recursive.


use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use http::HeaderMap;
use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex as BytesRegex};
use std::env;
use std::fmt::{self, Write as _};

use crate::core::FilterRequest;

/// Placeholder token: an identifier of letters, digits, `_`, `-` and `.`,
/// optionally followed by a `:format` suffix.
static PLACEHOLDER: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"\{[a-zA-Z0-9_\-.]+(?::[^{}]*)?\}").expect("placeholder regex"));

/// Header names whose values carry a timestamp and therefore accept a
/// `:format` suffix.
const TIMESTAMP_HEADERS: &[&str] = &["last-modified", "date", "expires"];

/// Produce the replacement bytes for one regex match.
///
/// An empty template is the shortcut for "strip matched text": it deletes
/// the match outright.
pub(crate) fn expand(
    template: &[u8],
    captures: &Captures<'_>,
    context: &ReplacementContext<'_>,
) -> Vec<u8> {
    if template.is_empty() {
        return Vec::new();
    }
    PLACEHOLDER
        .replace_all(template, |token: &Captures<'_>| {
            resolve_token(&token[0], captures, context)
        })
        .into_owned()
}

/// Resolve a single `{...}` token; `token` includes the braces.
fn resolve_token(token: &[u8], captures: &Captures<'_>, context: &ReplacementContext<'_>) -> Vec<u8> {
    // The scanning pattern is pure ASCII, so this never fails in practice.
    let name = match std::str::from_utf8(&token[1..token.len() - 1]) {
        Ok(name) => name,
        Err(_) => return token.to_vec(),
    };

    if let Ok(index) = name.parse::<usize>() {
        if index < captures.len() {
            return captures
                .get(index)
                .map(|m| m.as_bytes().to_vec())
                .unwrap_or_default();
        }
        return token.to_vec();
    }

    match context.resolve(name) {
        Some(value) => value.into_bytes(),
        None => token.to_vec(),
    }
}

/// The per-response bag of request/response metadata available to
/// placeholder resolution.  Ephemeral; borrowed for one rule execution.
#[derive(Debug)]
pub(crate) struct ReplacementContext<'a> {
    request: &'a FilterRequest,
    response_headers: &'a HeaderMap,
}

impl<'a> ReplacementContext<'a> {
    pub(crate) fn new(request: &'a FilterRequest, response_headers: &'a HeaderMap) -> Self {
        Self {
            request,
            response_headers,
        }
    }

    /// Resolve a placeholder identifier (without braces) to its value.
    /// `None` means "unresolved": the caller keeps the token verbatim.
    pub(crate) fn resolve(&self, name: &str) -> Option<String> {
        let (name, format) = match name.split_once(':') {
            Some((name, format)) => (name, Some(format)),
            None => (name, None),
        };

        if name == "now" {
            return Some(format_time(&Utc::now(), format));
        }
        if let Some(rest) = name.strip_prefix("response_") {
            return self.response_value(rest, format);
        }
        // A format suffix only makes sense on values with time semantics.
        if format.is_some() {
            return None;
        }
        if let Some(rest) = name.strip_prefix("request_") {
            return self.request_value(rest);
        }
        if let Some(variable) = name.strip_prefix("env_") {
            return Some(env::var(variable).unwrap_or_default());
        }
        None
    }

    fn request_value(&self, name: &str) -> Option<String> {
        if let Some(header) = name.strip_prefix("header_") {
            return Some(header_string(&self.request.headers, header));
        }
        match name {
            "url" => Some(self.request.url.clone()),
            "path" => Some(self.request.path.clone()),
            "method" => Some(self.request.method.to_string()),
            "host" => Some(self.request.host.clone()),
            "proto" => Some(self.request.proto.clone()),
            "scheme" => Some(self.request.scheme.clone()),
            "remoteAddress" => Some(self.request.remote_addr.clone()),
            _ => None,
        }
    }

    fn response_value(&self, name: &str, format: Option<&str>) -> Option<String> {
        let header = name.strip_prefix("header_")?;
        let raw = header_string(self.response_headers, header);
        if is_timestamp_header(header) {
            if let Ok(parsed) = DateTime::parse_from_rfc2822(&raw) {
                return Some(format_time(&parsed, format));
            }
            // Not parseable as a time: fall back to the plain string.
            return Some(raw);
        }
        match format {
            Some(_) => None,
            None => Some(raw),
        }
    }
}

/// Case-insensitive header lookup; `_` in the placeholder name also
/// matches `-` in the wire name, so `{response_header_last_modified}`
/// finds `Last-Modified`.  Absent headers resolve to the empty string.
fn header_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .or_else(|| headers.get(name.replace('_', "-")))
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn is_timestamp_header(name: &str) -> bool {
    let normalized = name.replace('_', "-").to_lowercase();
    TIMESTAMP_HEADERS.contains(&normalized.as_str())
}

/// Render a time value per the placeholder's `:format` suffix.
///
/// `RFC`/`RFC3339`/absent selects RFC 3339 at seconds precision (`Z` for
/// UTC), `unix` seconds since epoch, `timestamp` milliseconds since
/// epoch; anything else is a chrono strftime layout.  An invalid layout
/// falls back to RFC 3339 instead of failing the response.
pub(crate) fn format_time<Tz: TimeZone>(time: &DateTime<Tz>, format: Option<&str>) -> String
where
    Tz::Offset: fmt::Display,
{
    match format {
        None | Some("") | Some("RFC") | Some("RFC3339") => {
            time.to_rfc3339_opts(SecondsFormat::Secs, true)
        }
        Some("unix") => time.timestamp().to_string(),
        Some("timestamp") => time.timestamp_millis().to_string(),
        Some(layout) => {
            let mut rendered = String::new();
            match write!(rendered, "{}", time.format(layout)) {
                Ok(()) => rendered,
                Err(_) => time.to_rfc3339_opts(SecondsFormat::Secs, true),
            }
        }
    }
}
