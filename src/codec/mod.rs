// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transparent gzip transcoding around the rewrite step.
//!
//! Text rules cannot operate on compressed bytes, so a body declared as
//! `Content-Encoding: gzip` is decompressed before substitution and
//! recompressed afterwards.  Decoding fails soft: a malformed stream
//! leaves the raw bytes (and the encoding header) untouched and the
//! caller skips rewriting for that response.


use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use http::HeaderMap;
use http::header::CONTENT_ENCODING;
use std::io::{self, Read, Write};

/// Outcome of the decode pass over a recorded body.
#[derive(Debug)]
pub enum Decoded {
    /// The body carried no gzip encoding; bytes passed through as-is.
    Plain(Vec<u8>),
    /// The body was gzip and decoded successfully.  The caller must drop
    /// the `Content-Encoding` header so it reflects what is finally sent.
    Gzip(Vec<u8>),
    /// The body declared gzip but the stream is malformed.  Soft
    /// failure: treat the raw bytes as the body and skip rewriting.
    Failed,
}

/// Whether the response declares a gzip body, case-insensitively.
pub fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("gzip"))
}

/// Decode `raw` according to the response's declared content encoding.
pub fn decode(headers: &HeaderMap, raw: &[u8]) -> Decoded {
    if !is_gzip(headers) {
        return Decoded::Plain(raw.to_vec());
    }
    let mut plaintext = Vec::new();
    match GzDecoder::new(raw).read_to_end(&mut plaintext) {
        Ok(_) => Decoded::Gzip(plaintext),
        Err(_) => Decoded::Failed,
    }
}

/// Re-encode the rewritten body at the strongest compression level.
pub fn encode(plaintext: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(plaintext)?;
    encoder.finish()
}
