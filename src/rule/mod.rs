// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rewrite rules.
//!
//! A [`Rule`] is an immutable (match-predicate, search pattern,
//! replacement template) triple, compiled once from its [`RuleConfig`]
//! and shared read-only across requests.  Matching combines the path and
//! content-type predicates; execution delegates to the placeholder
//! engine in [`template`](crate::template).


use http::HeaderMap;
use http::header::CONTENT_TYPE;
use regex::Regex;
use regex::bytes::{Captures, Regex as BytesRegex};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::config::{ConfigError, FilterConfig, RuleConfig};
use crate::core::FilterRequest;
use crate::template::{self, ReplacementContext};

/// How the `path` and `content_type` predicates combine when a rule
/// carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combination {
    /// Both predicates must match.
    And,
    /// Either predicate suffices.  The default, preserving the classic
    /// "any predicate matches" behaviour.
    #[default]
    Or,
}

/// A compiled rewrite rule.  Immutable after construction.
#[derive(Debug, Clone)]
pub struct Rule {
    path: Option<Regex>,
    content_type: Option<Regex>,
    combination: Combination,
    search: BytesRegex,
    replacement: Vec<u8>,
}

impl Rule {
    /// Compile the rule at position `index` of the configured list.
    pub fn from_config(config: &RuleConfig, index: usize) -> Result<Self, ConfigError> {
        if config.path.is_none() && config.content_type.is_none() {
            return Err(ConfigError::rule_error(
                index,
                "neither 'path' nor 'content_type' definition was provided",
            ));
        }

        let path = config
            .path
            .as_deref()
            .map(|p| compile(index, "path", p))
            .transpose()?;
        let content_type = config
            .content_type
            .as_deref()
            .map(|p| compile(index, "content_type", p))
            .transpose()?;

        let search_pattern = config.search_pattern.as_deref().ok_or_else(|| {
            ConfigError::rule_error(index, "no 'search_pattern' definition was provided")
        })?;
        let search = BytesRegex::new(search_pattern).map_err(|e| {
            ConfigError::rule_error(index, format!("invalid 'search_pattern' regex: {e}"))
        })?;

        let replacement = match (&config.replacement, &config.replacement_file) {
            (Some(text), _) => text.clone().into_bytes(),
            (None, Some(file)) => fs::read(file).map_err(|e| {
                ConfigError::rule_error(
                    index,
                    format!("cannot read replacement file '{}': {e}", file.display()),
                )
            })?,
            (None, None) => Vec::new(),
        };

        Ok(Self {
            path,
            content_type,
            combination: config.path_content_type_combination,
            search,
            replacement,
        })
    }

    /// Whether this rule applies to the given request/response pair.
    ///
    /// The content-type predicate inspects the response headers as
    /// currently set; it can only fire once the downstream handler has
    /// set them, matching standard response-construction order.
    pub fn matches(&self, request: &FilterRequest, response_headers: &HeaderMap) -> bool {
        let path_hit = self.path.as_ref().map(|p| p.is_match(&request.path));
        let content_type = response_headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let content_type_hit = self.content_type.as_ref().map(|p| p.is_match(content_type));

        match (path_hit, content_type_hit) {
            (Some(p), Some(c)) => match self.combination {
                Combination::And => p && c,
                Combination::Or => p || c,
            },
            (Some(p), None) => p,
            (None, Some(c)) => c,
            // Rejected at load time.
            (None, None) => false,
        }
    }

    /// Run a global substitution of this rule's search pattern over
    /// `input`, expanding the replacement template for every match.
    pub fn execute(
        &self,
        request: &FilterRequest,
        response_headers: &HeaderMap,
        input: &[u8],
    ) -> Vec<u8> {
        let context = ReplacementContext::new(request, response_headers);
        self.search
            .replace_all(input, |captures: &Captures<'_>| {
                template::expand(&self.replacement, captures, &context)
            })
            .into_owned()
    }
}

fn compile(index: usize, field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| ConfigError::rule_error(index, format!("invalid '{field}' regex: {e}")))
}

/// The configured rule list, compiled and ordered.
///
/// Built once at startup and shared read-only across all requests; this
/// is the only cross-request shared state in the crate.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Validate and compile every rule of the configuration.
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| Rule::from_config(rule, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Iterate the rules in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Whether any rule applies to the given request/response pair.
    pub fn any_match(&self, request: &FilterRequest, response_headers: &HeaderMap) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.matches(request, response_headers))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
