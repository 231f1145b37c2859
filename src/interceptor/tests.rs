// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::config::{FilterConfig, RuleConfig};
    use crate::core::{FilterError, FilterRequest};
    use crate::interceptor::{Interceptor, ResponseSink, body_allowed_for_status};
    use crate::rule::RuleSet;
    use async_trait::async_trait;
    use http::{HeaderMap, StatusCode};
    use std::sync::Arc;

    /// A sink that records everything it is handed.
    #[derive(Debug, Default)]
    struct MockSink {
        status: Option<StatusCode>,
        headers: HeaderMap,
        body: Vec<u8>,
        header_commits: usize,
    }

    #[async_trait]
    impl ResponseSink for MockSink {
        async fn send_headers(
            &mut self,
            status: StatusCode,
            headers: &HeaderMap,
        ) -> Result<(), FilterError> {
            self.status = Some(status);
            self.headers = headers.clone();
            self.header_commits += 1;
            Ok(())
        }

        async fn send_body(&mut self, chunk: &[u8]) -> Result<usize, FilterError> {
            self.body.extend_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    fn rules_matching_path(pattern: &str) -> Arc<RuleSet> {
        let config = FilterConfig {
            rules: vec![RuleConfig {
                path: Some(pattern.to_string()),
                search_pattern: Some("world".to_string()),
                replacement: Some("there".to_string()),
                ..RuleConfig::default()
            }],
            ..FilterConfig::default()
        };
        Arc::new(RuleSet::from_config(&config).unwrap())
    }

    fn interceptor(
        rules: Arc<RuleSet>,
        max_buffer_size: Option<usize>,
    ) -> Interceptor<MockSink> {
        Interceptor::new(
            MockSink::default(),
            FilterRequest::for_path("/index.html"),
            rules,
            max_buffer_size,
        )
    }

    #[test]
    fn test_body_allowed_for_status() {
        for code in 100..200 {
            assert!(!body_allowed_for_status(StatusCode::from_u16(code).unwrap()));
        }
        assert!(!body_allowed_for_status(StatusCode::NO_CONTENT));
        assert!(!body_allowed_for_status(StatusCode::NOT_MODIFIED));

        assert!(body_allowed_for_status(StatusCode::OK));
        assert!(body_allowed_for_status(StatusCode::NOT_FOUND));
        assert!(body_allowed_for_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(body_allowed_for_status(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_defaults() {
        let w = interceptor(rules_matching_path("never-matches"), None);
        assert_eq!(w.status(), StatusCode::OK);
        assert!(w.body_allowed());
        assert!(!w.was_recorded());
        assert!(w.recorded().is_empty());
        assert!(!w.headers_committed());
    }

    #[tokio::test]
    async fn test_set_status_updates_body_allowed() {
        let mut w = interceptor(rules_matching_path("never-matches"), None);
        w.set_status(StatusCode::NO_CONTENT);
        assert_eq!(w.status(), StatusCode::NO_CONTENT);
        assert!(!w.body_allowed());

        w.set_status(StatusCode::NOT_FOUND);
        assert!(w.body_allowed());
    }

    #[tokio::test]
    async fn test_zero_length_write_is_a_noop() {
        let mut w = interceptor(rules_matching_path("\\.html$"), None);
        assert_eq!(w.write(b"").await.unwrap(), 0);
        // The mode decision must not have been made.
        assert!(!w.was_recorded());
        assert!(!w.headers_committed());
        assert!(w.into_inner().body.is_empty());
    }

    #[tokio::test]
    async fn test_buffers_when_a_rule_matches() {
        let mut w = interceptor(rules_matching_path("\\.html$"), None);
        assert_eq!(w.write(b"Hello ").await.unwrap(), 6);
        assert_eq!(w.write(b"world!").await.unwrap(), 6);

        assert!(w.was_recorded());
        assert_eq!(w.recorded(), b"Hello world!");
        // Nothing reaches the sink while buffering.
        assert!(!w.headers_committed());
        let sink = w.into_inner();
        assert!(sink.body.is_empty());
        assert_eq!(sink.header_commits, 0);
    }

    #[tokio::test]
    async fn test_streams_when_no_rule_matches() {
        let mut w = interceptor(rules_matching_path("\\.css$"), None);
        assert_eq!(w.write(b"Hello ").await.unwrap(), 6);
        assert_eq!(w.write(b"world!").await.unwrap(), 6);

        assert!(!w.was_recorded());
        assert!(w.headers_committed());
        let sink = w.into_inner();
        assert_eq!(sink.body, b"Hello world!");
        assert_eq!(sink.header_commits, 1);
        assert_eq!(sink.status, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_headers_visible_at_decision_time() {
        // A content-type rule must see headers the producer set before
        // the first body write.
        let config = FilterConfig {
            rules: vec![RuleConfig {
                content_type: Some("^text/html".to_string()),
                search_pattern: Some("x".to_string()),
                ..RuleConfig::default()
            }],
            ..FilterConfig::default()
        };
        let rules = Arc::new(RuleSet::from_config(&config).unwrap());

        let mut w = interceptor(Arc::clone(&rules), None);
        w.headers_mut()
            .insert("content-type", "text/html".parse().unwrap());
        w.write(b"x").await.unwrap();
        assert!(w.was_recorded());

        // Without the header the same rule cannot fire.
        let mut w = interceptor(rules, None);
        w.write(b"x").await.unwrap();
        assert!(!w.was_recorded());
    }

    #[tokio::test]
    async fn test_overflow_flushes_and_degrades_to_streaming() {
        let mut w = interceptor(rules_matching_path("\\.html$"), Some(5));
        assert_eq!(w.write(b"Hello").await.unwrap(), 5);
        assert!(w.was_recorded());

        // Crossing the ceiling flushes the buffer and the new chunk.
        assert_eq!(w.write(b" world!").await.unwrap(), 7);
        assert!(!w.was_recorded());
        assert!(w.headers_committed());

        // No re-buffering afterwards.
        assert_eq!(w.write(b" bye").await.unwrap(), 4);
        let sink = w.into_inner();
        assert_eq!(sink.body, b"Hello world! bye");
        assert_eq!(sink.header_commits, 1);
    }

    #[tokio::test]
    async fn test_buffer_exactly_at_ceiling_does_not_overflow() {
        let mut w = interceptor(rules_matching_path("\\.html$"), Some(5));
        assert_eq!(w.write(b"Hello").await.unwrap(), 5);
        assert!(w.was_recorded());
        assert_eq!(w.recorded(), b"Hello");
        assert!(!w.headers_committed());
    }

    #[tokio::test]
    async fn test_commit_headers_twice_fails_loudly() {
        let mut w = interceptor(rules_matching_path("\\.html$"), None);
        w.set_status(StatusCode::NOT_FOUND);
        w.headers_mut().insert("x-test", "1".parse().unwrap());

        w.commit_headers().await.unwrap();
        let error = w.commit_headers().await.unwrap_err();
        assert!(matches!(error, FilterError::HeadersAlreadySent));

        // The idempotent form keeps working.
        w.ensure_committed().await.unwrap();

        let sink = w.into_inner();
        assert_eq!(sink.header_commits, 1);
        assert_eq!(sink.status, Some(StatusCode::NOT_FOUND));
        assert_eq!(sink.headers.get("x-test").unwrap(), "1");
    }
}
