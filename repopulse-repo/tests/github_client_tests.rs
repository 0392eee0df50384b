//! `GitHubApiClient` against a local fake GitHub
//!
//! The fake serves a handful of repositories on an ephemeral port and counts the
//! requests each endpoint receives.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use repopulse_core::{ErrorKind, RepositoryReference, RetryConfig};
use repopulse_repo::{ApiClientConfig, GitHubApiClient, PaginationLimits, UpstreamClient};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Default)]
struct Attempts {
    missing: AtomicUsize,
    flaky_languages: AtomicUsize,
    limited_contributors: AtomicUsize,
    empty_commits: AtomicUsize,
    empty_contributors: AtomicUsize,
    paged_branches: AtomicUsize,
}

type Shared = Arc<Attempts>;

async fn missing_repository(State(attempts): State<Shared>) -> Response {
    attempts.missing.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "Not Found"})),
    )
        .into_response()
}

/// Fails once with a 502, then answers
async fn flaky_languages(State(attempts): State<Shared>) -> Response {
    if attempts.flaky_languages.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::BAD_GATEWAY, "upstream hiccup").into_response();
    }
    Json(json!({"Rust": 7000, "Shell": 3000})).into_response()
}

async fn limited_contributors(State(attempts): State<Shared>) -> Response {
    attempts.limited_contributors.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::FORBIDDEN,
        [("x-ratelimit-remaining", "0")],
        Json(json!({"message": "API rate limit exceeded for 127.0.0.1."})),
    )
        .into_response()
}

async fn empty_commits(State(attempts): State<Shared>) -> Response {
    attempts.empty_commits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::CONFLICT,
        Json(json!({"message": "Git Repository is empty."})),
    )
        .into_response()
}

async fn empty_contributors(State(attempts): State<Shared>) -> Response {
    attempts.empty_contributors.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT.into_response()
}

/// Three pages of two branches, linked with `rel="next"`
async fn paged_branches(
    State(attempts): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    attempts.paged_branches.fetch_add(1, Ordering::SeqCst);
    let page: u32 = query
        .get("page")
        .and_then(|page| page.parse().ok())
        .unwrap_or(1);
    let branches = json!([
        {"name": format!("branch-{}a", page)},
        {"name": format!("branch-{}b", page)}
    ]);

    if page < 3 {
        let link = format!(
            "<https://api.github.com/repositories/1/branches?per_page=2&page={}>; rel=\"next\", \
             <https://api.github.com/repositories/1/branches?per_page=2&page=3>; rel=\"last\"",
            page + 1
        );
        ([(header::LINK, link)], Json(branches)).into_response()
    } else {
        Json(branches).into_response()
    }
}

async fn spawn_fake_github() -> (String, Shared) {
    let attempts = Shared::default();
    let app = Router::new()
        .route("/repos/octocat/missing", get(missing_repository))
        .route("/repos/octocat/flaky/languages", get(flaky_languages))
        .route("/repos/octocat/limited/contributors", get(limited_contributors))
        .route("/repos/octocat/empty/commits", get(empty_commits))
        .route("/repos/octocat/empty/contributors", get(empty_contributors))
        .route("/repos/octocat/paged/branches", get(paged_branches))
        .with_state(Arc::clone(&attempts));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    (format!("http://127.0.0.1:{}", port), attempts)
}

fn client(base_url: &str, limits: PaginationLimits) -> GitHubApiClient {
    GitHubApiClient::with_settings(
        ApiClientConfig::github(None).with_base_url(base_url),
        limits,
        RetryConfig::no_delay(3),
    )
    .unwrap()
}

fn reference(name: &str) -> RepositoryReference {
    RepositoryReference::parse(&format!("octocat/{name}")).unwrap()
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let (base_url, attempts) = spawn_fake_github().await;
    let client = client(&base_url, PaginationLimits::default());

    let error = client.fetch_metadata(&reference("missing")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(attempts.missing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_error_is_retried_until_success() {
    let (base_url, attempts) = spawn_fake_github().await;
    let client = client(&base_url, PaginationLimits::default());

    let languages = client.fetch_languages(&reference("flaky")).await.unwrap();

    assert_eq!(languages.get("Rust"), Some(&7000));
    assert_eq!(languages.len(), 2);
    assert_eq!(attempts.flaky_languages.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_exhausted_rate_limit_fails_after_all_attempts() {
    let (base_url, attempts) = spawn_fake_github().await;
    let client = client(&base_url, PaginationLimits::default());

    let error = client
        .fetch_contributors(&reference("limited"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::RateLimited);
    assert!(error.to_string().contains("rate limit"));
    assert_eq!(attempts.limited_contributors.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_empty_repository_answers_resolve_to_empty_listings() {
    let (base_url, attempts) = spawn_fake_github().await;
    let client = client(&base_url, PaginationLimits::default());
    let empty = reference("empty");

    let commits = client.fetch_commits(&empty, None).await.unwrap();
    assert!(commits.items.is_empty());
    assert!(!commits.truncated);

    let contributors = client.fetch_contributors(&empty).await.unwrap();
    assert!(contributors.items.is_empty());

    assert_eq!(attempts.empty_commits.load(Ordering::SeqCst), 1);
    assert_eq!(attempts.empty_contributors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_link_header_pagination_runs_to_last_page() {
    let (base_url, attempts) = spawn_fake_github().await;
    let client = client(
        &base_url,
        PaginationLimits {
            per_page: 2,
            ..PaginationLimits::default()
        },
    );

    let branches = client.fetch_branches(&reference("paged")).await.unwrap();

    let names: Vec<&str> = branches.items.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(
        names,
        ["branch-1a", "branch-1b", "branch-2a", "branch-2b", "branch-3a", "branch-3b"]
    );
    assert!(!branches.truncated);
    assert_eq!(branches.pages_fetched, 3);
    assert_eq!(attempts.paged_branches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_link_header_pagination_stops_at_page_cap() {
    let (base_url, attempts) = spawn_fake_github().await;
    let client = client(
        &base_url,
        PaginationLimits {
            per_page: 2,
            max_branch_pages: 2,
            ..PaginationLimits::default()
        },
    );

    let branches = client.fetch_branches(&reference("paged")).await.unwrap();

    assert_eq!(branches.items.len(), 4);
    assert!(branches.truncated);
    assert_eq!(attempts.paged_branches.load(Ordering::SeqCst), 2);
}
