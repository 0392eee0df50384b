//! Upstream API client layer
//!
//! Page-level access to the code-hosting REST API plus the pagination and sampling
//! helpers built on top of it. Aggregators only ever see the records defined here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use repopulse_core::{ErrorContext, PulseError, PulseResult, RepositoryReference, UpstreamConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;

pub mod github;

#[cfg(test)]
mod tests;

pub use github::GitHubApiClient;

/// Repository metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    pub full_name: String,
    pub owner_login: String,
    pub owner_avatar_url: String,
    pub description: Option<String>,
    pub html_url: String,
    pub default_branch: String,
    /// Language reported by the host, not derived from byte counts
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    /// Size in KB
    pub size: u64,
    pub open_issues: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author_login: Option<String>,
    /// Committer date, falling back to the author date
    pub committed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub login: String,
    pub contributions: u64,
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub name: String,
}

/// Issue or pull request; the issues endpoint returns both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub is_pull_request: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDelta {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub sha: String,
    pub files: Vec<FileDelta>,
}

/// One entry of the recursive tree of the default branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// `blob`, `tree` or `commit` (submodule)
    pub entry_type: String,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == "blob"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    pub entries: Vec<TreeEntry>,
    /// Set by the host when the tree was too large to return whole
    pub truncated: bool,
}

/// Position of one page in a paginated listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub per_page: u32,
}

impl PageCursor {
    pub fn first(per_page: u32) -> Self {
        Self { page: 1, per_page }
    }

    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            per_page: self.per_page,
        }
    }
}

/// One page of upstream results plus the cursor of the following page
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

impl<T> RawPage<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn empty() -> Self {
        Self::last(Vec::new())
    }
}

/// Items collected across pages
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    /// The page cap stopped collection while more pages remained
    pub truncated: bool,
    pub pages_fetched: u32,
}

/// Page caps per listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub per_page: u32,
    pub max_commit_pages: u32,
    pub max_contributor_pages: u32,
    pub max_branch_pages: u32,
    pub max_issue_pages: u32,
    /// Concurrent commit-detail requests while sampling file changes
    pub detail_concurrency: usize,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self::from(&UpstreamConfig::default())
    }
}

impl From<&UpstreamConfig> for PaginationLimits {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            per_page: config.per_page,
            max_commit_pages: config.max_commit_pages,
            max_contributor_pages: config.max_contributor_pages,
            max_branch_pages: config.max_branch_pages,
            max_issue_pages: config.max_issue_pages,
            detail_concurrency: config.max_concurrent_requests,
        }
    }
}

/// Follow cursors until the listing is exhausted or `max_pages` pages were read
pub async fn collect_pages<T, F, Fut>(
    first: PageCursor,
    max_pages: u32,
    mut fetch: F,
) -> PulseResult<Paginated<T>>
where
    F: FnMut(PageCursor) -> Fut,
    Fut: Future<Output = PulseResult<RawPage<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = first;
    let mut pages_fetched = 0;

    loop {
        let page = fetch(cursor).await?;
        pages_fetched += 1;
        items.extend(page.items);

        match page.next {
            None => {
                return Ok(Paginated {
                    items,
                    truncated: false,
                    pages_fetched,
                })
            }
            Some(_) if pages_fetched >= max_pages.max(1) => {
                return Ok(Paginated {
                    items,
                    truncated: true,
                    pages_fetched,
                })
            }
            Some(next) => cursor = next,
        }
    }
}

/// Access to one code-hosting API.
///
/// Implementors provide page-level requests, including their own retry and
/// rate-limit handling; the listing helpers are derived from them.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    fn limits(&self) -> PaginationLimits {
        PaginationLimits::default()
    }

    async fn fetch_metadata(&self, reference: &RepositoryReference)
        -> PulseResult<RepositoryMetadata>;

    /// Language name to byte count
    async fn fetch_languages(
        &self,
        reference: &RepositoryReference,
    ) -> PulseResult<BTreeMap<String, u64>>;

    async fn fetch_commits_page(
        &self,
        reference: &RepositoryReference,
        since: Option<DateTime<Utc>>,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<CommitRecord>>;

    async fn fetch_contributors_page(
        &self,
        reference: &RepositoryReference,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<ContributorRecord>>;

    async fn fetch_branches_page(
        &self,
        reference: &RepositoryReference,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<BranchRecord>>;

    async fn fetch_issues_page(
        &self,
        reference: &RepositoryReference,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<IssueRecord>>;

    async fn fetch_commit_detail(
        &self,
        reference: &RepositoryReference,
        sha: &str,
    ) -> PulseResult<CommitDetail>;

    async fn fetch_file_tree(&self, reference: &RepositoryReference) -> PulseResult<FileTree>;

    /// Commits newest first, up to the commit page cap
    async fn fetch_commits(
        &self,
        reference: &RepositoryReference,
        since: Option<DateTime<Utc>>,
    ) -> PulseResult<Paginated<CommitRecord>> {
        let limits = self.limits();
        collect_pages(
            PageCursor::first(limits.per_page),
            limits.max_commit_pages,
            |cursor| self.fetch_commits_page(reference, since, cursor),
        )
        .await
    }

    async fn fetch_contributors(
        &self,
        reference: &RepositoryReference,
    ) -> PulseResult<Paginated<ContributorRecord>> {
        let limits = self.limits();
        collect_pages(
            PageCursor::first(limits.per_page),
            limits.max_contributor_pages,
            |cursor| self.fetch_contributors_page(reference, cursor),
        )
        .await
    }

    async fn fetch_branches(
        &self,
        reference: &RepositoryReference,
    ) -> PulseResult<Paginated<BranchRecord>> {
        let limits = self.limits();
        collect_pages(
            PageCursor::first(limits.per_page),
            limits.max_branch_pages,
            |cursor| self.fetch_branches_page(reference, cursor),
        )
        .await
    }

    async fn fetch_issues(
        &self,
        reference: &RepositoryReference,
    ) -> PulseResult<Paginated<IssueRecord>> {
        let limits = self.limits();
        collect_pages(
            PageCursor::first(limits.per_page),
            limits.max_issue_pages,
            |cursor| self.fetch_issues_page(reference, cursor),
        )
        .await
    }

    /// Per-file deltas of the sampled commits, in sample order.
    ///
    /// Any detail request that still fails after retries fails the whole sample.
    async fn fetch_file_change_stats(
        &self,
        reference: &RepositoryReference,
        commit_sample: &[String],
    ) -> PulseResult<Vec<CommitDetail>> {
        let concurrency = self.limits().detail_concurrency.max(1);
        stream::iter(commit_sample.to_vec())
            .map(move |sha| async move { self.fetch_commit_detail(reference, &sha).await })
            .buffered(concurrency)
            .try_collect()
            .await
    }
}

/// Configuration for API clients
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Access token for authentication
    pub access_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Additional headers
    pub headers: HashMap<String, String>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self::from(&UpstreamConfig::default())
    }
}

impl From<&UpstreamConfig> for ApiClientConfig {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            access_token: config.token.clone(),
            timeout_seconds: config.timeout_seconds,
            user_agent: config.user_agent.clone(),
            headers: HashMap::new(),
        }
    }
}

impl ApiClientConfig {
    /// Configuration for the public GitHub API
    pub fn github(access_token: Option<String>) -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            access_token,
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set additional header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

/// Helper function to create HTTP client with common configuration
pub(crate) fn create_http_client(config: &ApiClientConfig) -> PulseResult<reqwest::Client> {
    let client_error = |message: String, source: Box<dyn std::error::Error + Send + Sync>| {
        PulseError::Config {
            message,
            source: Some(source),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        }
    };

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent)
            .map_err(|e| client_error(format!("Invalid user agent: {}", e), Box::new(e)))?,
    );

    for (key, value) in &config.headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            client_error(format!("Invalid header name '{}': {}", key, e), Box::new(e))
        })?;
        let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            client_error(
                format!("Invalid header value for '{}': {}", key, e),
                Box::new(e),
            )
        })?;
        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| client_error(format!("Failed to create HTTP client: {}", e), Box::new(e)))
}
