//! GitHub API client implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repopulse_core::{
    retry_with_backoff, ErrorContext, PulseError, PulseResult, RateLimitBudget,
    RepositoryReference, RetryConfig,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    create_http_client, ApiClientConfig, BranchRecord, CommitDetail, CommitRecord,
    ContributorRecord, FileDelta, FileTree, IssueRecord, PageCursor, PaginationLimits, RawPage,
    RepositoryMetadata, TreeEntry, UpstreamClient,
};

/// GitHub API client
pub struct GitHubApiClient {
    client: reqwest::Client,
    config: ApiClientConfig,
    limits: PaginationLimits,
    retry: RetryConfig,
    budget: Arc<RateLimitBudget>,
}

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    #[serde(default)]
    name: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    owner: Option<GitHubUser>,
    description: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    default_branch: String,
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    subscribers_count: u64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    open_issues_count: u64,
    created_at: Option<DateTime<Utc>>,
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    #[serde(default)]
    login: String,
    #[serde(default)]
    avatar_url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
    author: Option<GitHubUser>,
    #[serde(default)]
    commit: GitHubCommitBody,
}

#[derive(Debug, Default, Deserialize)]
struct GitHubCommitBody {
    author: Option<GitHubSignature>,
    committer: Option<GitHubSignature>,
}

#[derive(Debug, Deserialize)]
struct GitHubSignature {
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitHubContributor {
    #[serde(default)]
    login: String,
    #[serde(default)]
    contributions: u64,
    #[serde(default)]
    avatar_url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubIssue {
    number: u64,
    created_at: DateTime<Utc>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitDetail {
    sha: String,
    #[serde(default)]
    files: Vec<GitHubCommitFile>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitFile {
    filename: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct GitHubTreeResponse {
    #[serde(default)]
    tree: Vec<GitHubTreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubTreeItem {
    path: String,
    #[serde(rename = "type")]
    item_type: String,
}

impl From<GitHubRepository> for RepositoryMetadata {
    fn from(repo: GitHubRepository) -> Self {
        let (owner_login, owner_avatar_url) = repo
            .owner
            .map(|owner| (owner.login, owner.avatar_url))
            .unwrap_or_default();

        Self {
            name: repo.name,
            full_name: repo.full_name,
            owner_login,
            owner_avatar_url,
            description: repo.description,
            html_url: repo.html_url,
            default_branch: repo.default_branch,
            language: repo.language,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            watchers: repo.subscribers_count,
            size: repo.size,
            open_issues: repo.open_issues_count,
            created_at: repo.created_at,
            pushed_at: repo.pushed_at,
        }
    }
}

impl From<GitHubCommit> for CommitRecord {
    fn from(commit: GitHubCommit) -> Self {
        let committed_at = commit
            .commit
            .committer
            .and_then(|signature| signature.date)
            .or_else(|| commit.commit.author.and_then(|signature| signature.date));

        Self {
            sha: commit.sha,
            author_login: commit.author.map(|author| author.login),
            committed_at,
        }
    }
}

impl From<GitHubIssue> for IssueRecord {
    fn from(issue: GitHubIssue) -> Self {
        Self {
            number: issue.number,
            created_at: issue.created_at,
            is_pull_request: issue.pull_request.is_some(),
        }
    }
}

/// Body of a successful response, or nothing for hosts' "empty" answers
enum Fetched<T> {
    Body { value: T, next_page: Option<u32> },
    Empty,
}

impl<T> Fetched<T> {
    fn into_page<U, F>(self, cursor: PageCursor, convert: F) -> RawPage<U>
    where
        T: IntoIterator,
        F: FnMut(T::Item) -> U,
    {
        match self {
            Fetched::Body { value, next_page } => RawPage {
                items: value.into_iter().map(convert).collect(),
                next: next_page.map(|page| PageCursor {
                    page,
                    per_page: cursor.per_page,
                }),
            },
            Fetched::Empty => RawPage::empty(),
        }
    }
}

impl GitHubApiClient {
    /// Create a new GitHub API client with default limits and its own budget
    pub fn new(config: ApiClientConfig) -> PulseResult<Self> {
        let limits = PaginationLimits::default();
        Self::with_settings(config, limits, RetryConfig::default())
    }

    pub fn with_settings(
        config: ApiClientConfig,
        limits: PaginationLimits,
        retry: RetryConfig,
    ) -> PulseResult<Self> {
        let client = create_http_client(&config)?;
        let budget = Arc::new(RateLimitBudget::new(limits.detail_concurrency));

        info!(
            base_url = %config.base_url,
            authenticated = config.access_token.is_some(),
            "Created GitHub API client"
        );

        Ok(Self {
            client,
            config,
            limits,
            retry,
            budget,
        })
    }

    /// Share a budget with other clients using the same credential
    pub fn with_budget(mut self, budget: Arc<RateLimitBudget>) -> Self {
        self.budget = budget;
        self
    }

    pub fn budget(&self) -> Arc<RateLimitBudget> {
        Arc::clone(&self.budget)
    }

    /// Create authorization headers
    fn create_auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(ref token) = self.config.access_token {
            if let Ok(auth_value) = HeaderValue::from_str(&format!("token {}", token)) {
                headers.insert(reqwest::header::AUTHORIZATION, auth_value);
            }
        }

        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );

        headers
    }

    fn endpoint_url(&self, reference: &RepositoryReference, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if path.is_empty() {
            format!("{}/repos/{}/{}", base, reference.owner, reference.name)
        } else {
            format!(
                "{}/repos/{}/{}/{}",
                base,
                reference.owner,
                reference.name,
                path.trim_start_matches('/')
            )
        }
    }

    /// GET with retries under the shared budget
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        allow_empty: bool,
        operation: &str,
    ) -> PulseResult<Fetched<T>> {
        retry_with_backoff(&self.retry, Some(self.budget.as_ref()), operation, || {
            self.request_once(url, query, allow_empty, operation)
        })
        .await
    }

    async fn request_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        allow_empty: bool,
        operation: &str,
    ) -> PulseResult<Fetched<T>> {
        debug!(url = url, operation = operation, "Making GitHub API request");

        let response = self
            .client
            .get(url)
            .headers(self.create_auth_headers())
            .query(query)
            .send()
            .await
            .map_err(|e| PulseError::TransientNetwork {
                message: format!("Failed to reach GitHub API: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("github_api_client")
                    .with_operation(operation)
                    .with_metadata("url", url),
            })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || (allow_empty && status == StatusCode::CONFLICT) {
            debug!(url = url, status = status.as_u16(), "Empty repository response");
            return Ok(Fetched::Empty);
        }

        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(
                status,
                &headers,
                &body,
                Utc::now().timestamp(),
                url,
                operation,
            ));
        }

        let next_page = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_next_page);

        let value = response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                PulseError::Upstream {
                    status: status.as_u16(),
                    message: format!("Unexpected response body: {}", e),
                    context: ErrorContext::new("github_api_client").with_operation(operation),
                }
            } else {
                PulseError::TransientNetwork {
                    message: format!("Failed to read response body: {}", e),
                    source: Some(Box::new(e)),
                    context: ErrorContext::new("github_api_client").with_operation(operation),
                }
            }
        })?;

        Ok(Fetched::Body { value, next_page })
    }

    fn page_query(cursor: PageCursor) -> Vec<(&'static str, String)> {
        vec![
            ("per_page", cursor.per_page.to_string()),
            ("page", cursor.page.to_string()),
        ]
    }
}

#[async_trait]
impl UpstreamClient for GitHubApiClient {
    fn limits(&self) -> PaginationLimits {
        self.limits
    }

    async fn fetch_metadata(
        &self,
        reference: &RepositoryReference,
    ) -> PulseResult<RepositoryMetadata> {
        let url = self.endpoint_url(reference, "");
        match self
            .get_json::<GitHubRepository>(&url, &[], false, "fetch_metadata")
            .await?
        {
            Fetched::Body { value, .. } => Ok(value.into()),
            Fetched::Empty => Err(PulseError::Upstream {
                status: StatusCode::NO_CONTENT.as_u16(),
                message: format!("No metadata returned for {}", reference),
                context: ErrorContext::new("github_api_client").with_operation("fetch_metadata"),
            }),
        }
    }

    async fn fetch_languages(
        &self,
        reference: &RepositoryReference,
    ) -> PulseResult<BTreeMap<String, u64>> {
        let url = self.endpoint_url(reference, "languages");
        match self.get_json(&url, &[], true, "fetch_languages").await? {
            Fetched::Body { value, .. } => Ok(value),
            Fetched::Empty => Ok(BTreeMap::new()),
        }
    }

    async fn fetch_commits_page(
        &self,
        reference: &RepositoryReference,
        since: Option<DateTime<Utc>>,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<CommitRecord>> {
        let url = self.endpoint_url(reference, "commits");
        let mut query = Self::page_query(cursor);
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339()));
        }

        let fetched: Fetched<Vec<GitHubCommit>> =
            self.get_json(&url, &query, true, "fetch_commits").await?;
        Ok(fetched.into_page(cursor, CommitRecord::from))
    }

    async fn fetch_contributors_page(
        &self,
        reference: &RepositoryReference,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<ContributorRecord>> {
        let url = self.endpoint_url(reference, "contributors");
        let fetched: Fetched<Vec<GitHubContributor>> = self
            .get_json(&url, &Self::page_query(cursor), true, "fetch_contributors")
            .await?;
        Ok(fetched.into_page(cursor, |c| ContributorRecord {
            login: c.login,
            contributions: c.contributions,
            avatar_url: c.avatar_url,
        }))
    }

    async fn fetch_branches_page(
        &self,
        reference: &RepositoryReference,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<BranchRecord>> {
        let url = self.endpoint_url(reference, "branches");
        let fetched: Fetched<Vec<GitHubBranch>> = self
            .get_json(&url, &Self::page_query(cursor), true, "fetch_branches")
            .await?;
        Ok(fetched.into_page(cursor, |b| BranchRecord { name: b.name }))
    }

    async fn fetch_issues_page(
        &self,
        reference: &RepositoryReference,
        cursor: PageCursor,
    ) -> PulseResult<RawPage<IssueRecord>> {
        let url = self.endpoint_url(reference, "issues");
        let mut query = Self::page_query(cursor);
        query.push(("state", "all".to_string()));

        let fetched: Fetched<Vec<GitHubIssue>> =
            self.get_json(&url, &query, true, "fetch_issues").await?;
        Ok(fetched.into_page(cursor, IssueRecord::from))
    }

    async fn fetch_commit_detail(
        &self,
        reference: &RepositoryReference,
        sha: &str,
    ) -> PulseResult<CommitDetail> {
        let url = self.endpoint_url(reference, &format!("commits/{}", sha));
        match self
            .get_json::<GitHubCommitDetail>(&url, &[], false, "fetch_commit_detail")
            .await?
        {
            Fetched::Body { value, .. } => Ok(CommitDetail {
                sha: value.sha,
                files: value
                    .files
                    .into_iter()
                    .map(|file| FileDelta {
                        path: file.filename,
                        additions: file.additions,
                        deletions: file.deletions,
                    })
                    .collect(),
            }),
            Fetched::Empty => Ok(CommitDetail {
                sha: sha.to_string(),
                files: Vec::new(),
            }),
        }
    }

    async fn fetch_file_tree(&self, reference: &RepositoryReference) -> PulseResult<FileTree> {
        let url = self.endpoint_url(reference, "git/trees/HEAD");
        let query = [("recursive", "1".to_string())];
        match self
            .get_json::<GitHubTreeResponse>(&url, &query, true, "fetch_file_tree")
            .await?
        {
            Fetched::Body { value, .. } => Ok(FileTree {
                entries: value
                    .tree
                    .into_iter()
                    .map(|item| TreeEntry {
                        path: item.path,
                        entry_type: item.item_type,
                    })
                    .collect(),
                truncated: value.truncated,
            }),
            Fetched::Empty => Ok(FileTree::default()),
        }
    }
}

/// Page number of the `rel="next"` target of a `Link` header
pub fn parse_next_page(link_header: &str) -> Option<u32> {
    link_header.split(',').find_map(|part| {
        let mut sections = part.split(';');
        let target = sections.next()?.trim();
        let is_next = sections.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }

        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let url = url::Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}

/// Whether a failed response is a rate-limit signal
pub fn is_rate_limited(status: StatusCode, headers: &HeaderMap, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if status != StatusCode::FORBIDDEN {
        return false;
    }

    let remaining_exhausted = header_str(headers, "x-ratelimit-remaining")
        .map(|value| value.trim() == "0")
        .unwrap_or(false);

    remaining_exhausted
        || headers.contains_key(reqwest::header::RETRY_AFTER)
        || body.to_ascii_lowercase().contains("rate limit")
}

/// Milliseconds until the host accepts requests again, from `retry-after`
/// seconds or the `x-ratelimit-reset` epoch
pub fn rate_limit_hint(headers: &HeaderMap, now_epoch_secs: i64) -> Option<u64> {
    if let Some(seconds) = header_str(headers, reqwest::header::RETRY_AFTER.as_str())
        .and_then(|value| value.trim().parse::<u64>().ok())
    {
        return Some(seconds.saturating_mul(1000));
    }

    header_str(headers, "x-ratelimit-reset")
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(|reset| (reset - now_epoch_secs).max(0) as u64 * 1000)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Map a non-success response onto the error taxonomy
pub fn classify_failure(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    now_epoch_secs: i64,
    url: &str,
    operation: &str,
) -> PulseError {
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("Unknown error").to_string()
    } else {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| value.get("message")?.as_str().map(str::to_string))
            .unwrap_or_else(|| body.chars().take(200).collect())
    };
    let context = ErrorContext::new("github_api_client")
        .with_operation(operation)
        .with_metadata("url", url)
        .with_metadata("status", status.as_str());

    if is_rate_limited(status, headers, body) {
        return PulseError::RateLimited {
            message,
            retry_after_ms: rate_limit_hint(headers, now_epoch_secs),
            context: context.with_suggestion("Configure GITHUB_TOKEN for a higher rate limit"),
        };
    }

    match status {
        StatusCode::NOT_FOUND => PulseError::NotFound {
            resource: url.to_string(),
            context: context.with_suggestion("Repository not found or not accessible"),
        },
        s if s.is_server_error() => PulseError::TransientNetwork {
            message: format!("HTTP {}: {}", s.as_u16(), message),
            source: None,
            context,
        },
        s => PulseError::Upstream {
            status: s.as_u16(),
            message,
            context: context.with_suggestion(match s.as_u16() {
                401 => "Check your access token",
                403 => "Check repository permissions",
                _ => "Check the request parameters",
            }),
        },
    }
}
