//! Tests for the upstream API layer

#[cfg(test)]
mod tests {
    use super::super::github::{classify_failure, is_rate_limited, parse_next_page, rate_limit_hint};
    use super::super::*;
    use repopulse_core::{ErrorKind, RepositoryReference};
    use reqwest::header::{HeaderMap, HeaderValue};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_api_client_config_creation() {
        let github_config = ApiClientConfig::github(Some("test_token".to_string()));
        assert_eq!(github_config.base_url, "https://api.github.com");
        assert_eq!(github_config.access_token, Some("test_token".to_string()));

        let custom = ApiClientConfig::github(None)
            .with_base_url("http://127.0.0.1:9000/")
            .with_timeout(5)
            .with_header("X-Trace".to_string(), "1".to_string());
        assert_eq!(custom.base_url, "http://127.0.0.1:9000");
        assert_eq!(custom.timeout_seconds, 5);
        assert_eq!(custom.headers.get("X-Trace").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_client_rejects_invalid_header() {
        let config = ApiClientConfig::github(None)
            .with_header("bad header".to_string(), "value".to_string());
        let error = GitHubApiClient::new(config).err().unwrap();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_parse_next_page() {
        let link = "<https://api.github.com/repositories/1/commits?per_page=100&page=2>; rel=\"next\", \
                    <https://api.github.com/repositories/1/commits?per_page=100&page=9>; rel=\"last\"";
        assert_eq!(parse_next_page(link), Some(2));

        let last_page = "<https://api.github.com/repositories/1/commits?page=1>; rel=\"first\", \
                         <https://api.github.com/repositories/1/commits?page=8>; rel=\"prev\"";
        assert_eq!(parse_next_page(last_page), None);
        assert_eq!(parse_next_page(""), None);
        assert_eq!(parse_next_page("garbage; rel=\"next\""), None);
    }

    #[test]
    fn test_rate_limit_detection() {
        let mut exhausted = HeaderMap::new();
        exhausted.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        exhausted.insert("x-ratelimit-reset", HeaderValue::from_static("1060"));

        assert!(is_rate_limited(StatusCode::FORBIDDEN, &exhausted, ""));
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), ""));
        assert!(is_rate_limited(
            StatusCode::FORBIDDEN,
            &HeaderMap::new(),
            "{\"message\":\"You have exceeded a secondary rate limit\"}"
        ));
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &HeaderMap::new(), "Resource not accessible"));
        assert!(!is_rate_limited(StatusCode::NOT_FOUND, &exhausted, ""));

        assert_eq!(rate_limit_hint(&exhausted, 1000), Some(60_000));
        assert_eq!(rate_limit_hint(&exhausted, 2000), Some(0));

        let mut retry_after = HeaderMap::new();
        retry_after.insert("retry-after", HeaderValue::from_static("7"));
        assert_eq!(rate_limit_hint(&retry_after, 0), Some(7_000));
        assert_eq!(rate_limit_hint(&HeaderMap::new(), 0), None);
    }

    #[test]
    fn test_failure_classification() {
        let headers = HeaderMap::new();
        let classify = |status: StatusCode, body: &str| {
            classify_failure(status, &headers, body, 0, "https://api.github.com/repos/a/b", "test")
        };

        assert_eq!(classify(StatusCode::NOT_FOUND, "").kind(), ErrorKind::NotFound);
        assert_eq!(classify(StatusCode::BAD_GATEWAY, "").kind(), ErrorKind::TransientNetwork);
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS, "").kind(), ErrorKind::RateLimited);

        let rejected = classify(StatusCode::UNPROCESSABLE_ENTITY, "{\"message\":\"Validation Failed\"}");
        match rejected {
            repopulse_core::PulseError::Upstream { status, message, .. } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Validation Failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!classify(StatusCode::UNAUTHORIZED, "").is_recoverable());
    }

    struct NumberedPages {
        total_pages: u32,
        calls: AtomicUsize,
    }

    impl NumberedPages {
        async fn page(&self, cursor: PageCursor) -> repopulse_core::PulseResult<RawPage<u32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawPage {
                items: vec![cursor.page],
                next: (cursor.page < self.total_pages).then(|| cursor.next()),
            })
        }
    }

    #[tokio::test]
    async fn test_collect_pages_until_exhausted() {
        let source = NumberedPages {
            total_pages: 3,
            calls: AtomicUsize::new(0),
        };
        let collected = collect_pages(PageCursor::first(100), 10, |c| source.page(c))
            .await
            .unwrap();

        assert_eq!(collected.items, vec![1, 2, 3]);
        assert!(!collected.truncated);
        assert_eq!(collected.pages_fetched, 3);
    }

    #[tokio::test]
    async fn test_collect_pages_sets_truncated_at_cap() {
        let source = NumberedPages {
            total_pages: 20,
            calls: AtomicUsize::new(0),
        };
        let collected = collect_pages(PageCursor::first(100), 5, |c| source.page(c))
            .await
            .unwrap();

        assert_eq!(collected.items.len(), 5);
        assert!(collected.truncated);
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_limits_follow_upstream_config() {
        let mut upstream = repopulse_core::UpstreamConfig::default();
        upstream.max_commit_pages = 2;
        let limits = PaginationLimits::from(&upstream);
        assert_eq!(limits.max_commit_pages, 2);
        assert_eq!(limits.per_page, 100);

        let reference = RepositoryReference::parse("octocat/Hello-World").unwrap();
        assert_eq!(reference.full_name(), "octocat/Hello-World");
    }

    #[test]
    fn test_tree_entry_kinds() {
        let blob = TreeEntry {
            path: "src/main.rs".to_string(),
            entry_type: "blob".to_string(),
        };
        let dir = TreeEntry {
            path: "src".to_string(),
            entry_type: "tree".to_string(),
        };
        assert!(blob.is_file());
        assert!(!dir.is_file());
    }
}
