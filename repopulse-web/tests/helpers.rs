//! Test application helpers
//!
//! Spawns the full router on an ephemeral port, backed by an in-memory history
//! and a canned upstream, and drives it over HTTP with `reqwest`.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use repopulse_core::{
    not_found_error, AnalysisConfig, ErrorContext, PulseError, PulseResult, RepositoryReference,
};
use repopulse_engine::{AnalysisService, Analyzer, MemoryHistoryStore};
use repopulse_repo::{
    BranchRecord, CommitDetail, CommitRecord, ContributorRecord, FileDelta, FileTree, IssueRecord,
    PageCursor, RawPage, RepositoryMetadata, TreeEntry, UpstreamClient,
};
use repopulse_web::{create_app, AppState, WebConfig};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::net::TcpListener;

// tracing is initialized once per test binary
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

/// Upstream serving a small active repository.
///
/// `octocat/missing` does not exist and `octocat/limited` is rate limited on its
/// contributor listing.
#[derive(Default)]
pub struct CannedUpstream {
    pub calls: AtomicUsize,
}

impl CannedUpstream {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpstreamClient for CannedUpstream {
    async fn fetch_metadata(&self, reference: &RepositoryReference) -> PulseResult<RepositoryMetadata> {
        self.touch();
        if reference.name == "missing" {
            return Err(not_found_error!(
                format!("repos/{}", reference.full_name()),
                "canned_upstream"
            ));
        }
        Ok(RepositoryMetadata {
            name: reference.name.clone(),
            full_name: reference.full_name(),
            owner_login: reference.owner.clone(),
            html_url: reference.url.clone(),
            description: Some("My first repository".to_string()),
            default_branch: "main".to_string(),
            stars: 1500,
            forks: 300,
            ..RepositoryMetadata::default()
        })
    }

    async fn fetch_languages(&self, _: &RepositoryReference) -> PulseResult<BTreeMap<String, u64>> {
        self.touch();
        Ok(BTreeMap::from([
            ("Rust".to_string(), 3000),
            ("Shell".to_string(), 1000),
        ]))
    }

    async fn fetch_commits_page(
        &self,
        _: &RepositoryReference,
        _since: Option<DateTime<Utc>>,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<CommitRecord>> {
        self.touch();
        if cursor.page > 1 {
            return Ok(RawPage::empty());
        }
        let now = Utc::now();
        Ok(RawPage::last(
            (0..5)
                .map(|index| CommitRecord {
                    sha: format!("c{index}"),
                    author_login: Some("octocat".to_string()),
                    committed_at: Some(now - ChronoDuration::days(index)),
                })
                .collect(),
        ))
    }

    async fn fetch_contributors_page(
        &self,
        reference: &RepositoryReference,
        _: PageCursor,
    ) -> PulseResult<RawPage<ContributorRecord>> {
        self.touch();
        if reference.name == "limited" {
            return Err(PulseError::RateLimited {
                message: "API rate limit exceeded".to_string(),
                retry_after_ms: None,
                context: ErrorContext::new("canned_upstream"),
            });
        }
        Ok(RawPage::last(vec![ContributorRecord {
            login: "octocat".to_string(),
            contributions: 5,
            avatar_url: "https://avatars.githubusercontent.com/u/583231".to_string(),
        }]))
    }

    async fn fetch_branches_page(
        &self,
        _: &RepositoryReference,
        _: PageCursor,
    ) -> PulseResult<RawPage<BranchRecord>> {
        self.touch();
        Ok(RawPage::last(vec![BranchRecord {
            name: "main".to_string(),
        }]))
    }

    async fn fetch_issues_page(
        &self,
        _: &RepositoryReference,
        _: PageCursor,
    ) -> PulseResult<RawPage<IssueRecord>> {
        self.touch();
        Ok(RawPage::empty())
    }

    async fn fetch_commit_detail(
        &self,
        _: &RepositoryReference,
        sha: &str,
    ) -> PulseResult<CommitDetail> {
        self.touch();
        Ok(CommitDetail {
            sha: sha.to_string(),
            files: vec![FileDelta {
                path: "README.md".to_string(),
                additions: 1,
                deletions: 0,
            }],
        })
    }

    async fn fetch_file_tree(&self, _: &RepositoryReference) -> PulseResult<FileTree> {
        self.touch();
        Ok(FileTree {
            entries: vec![TreeEntry {
                path: "README.md".to_string(),
                entry_type: "blob".to_string(),
            }],
            truncated: false,
        })
    }
}

pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub upstream: Arc<CannedUpstream>,
}

impl TestApp {
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.api_client
            .delete(format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_analyze<Body>(&self, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(format!("{}/api/analyze", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

/// Spawn the app on a random local port
pub async fn spawn_app() -> TestApp {
    LazyLock::force(&TRACING);

    let upstream = Arc::new(CannedUpstream::default());
    let analyzer = Analyzer::new(
        Arc::clone(&upstream) as Arc<dyn UpstreamClient>,
        AnalysisConfig::default(),
    );
    let service = AnalysisService::new(analyzer, Arc::new(MemoryHistoryStore::new()));
    let state = AppState::with_service(WebConfig::default(), service);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, create_app(state))
            .await
            .expect("Server failed");
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        api_client: reqwest::Client::new(),
        upstream,
    }
}
