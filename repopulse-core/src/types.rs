//! Core data type definitions

use crate::error::{PulseError, PulseResult};
use crate::invalid_reference_error;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use url::Url;

static OWNER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,38})$").expect("valid regex"));
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("valid regex"));

const ACCEPTED_HOSTS: [&str; 2] = ["github.com", "www.github.com"];

/// A parsed, canonical pointer at one hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RepositoryReference {
    pub owner: String,
    #[serde(rename = "repo_name")]
    pub name: String,
    /// Canonical `https://github.com/{owner}/{name}` form
    #[serde(rename = "repo_url")]
    pub url: String,
}

impl RepositoryReference {
    /// Build a reference from already separated owner and name
    pub fn new(owner: &str, name: &str) -> PulseResult<Self> {
        let input = format!("{}/{}", owner, name);
        let name = name.strip_suffix(".git").unwrap_or(name);

        if !OWNER_PATTERN.is_match(owner) {
            return Err(invalid_reference_error!(
                input,
                format!("'{}' is not a valid owner", owner),
                "repository_reference"
            ));
        }
        if !NAME_PATTERN.is_match(name) || name == "." || name == ".." {
            return Err(invalid_reference_error!(
                input,
                format!("'{}' is not a valid repository name", name),
                "repository_reference"
            ));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            url: format!("https://github.com/{}/{}", owner, name),
        })
    }

    /// Parse any accepted reference form.
    ///
    /// Accepted: `http(s)://[www.]github.com/owner/name[.git][/]`,
    /// `github.com/owner/name` without a scheme, and the `owner/name` shorthand.
    pub fn parse(input: &str) -> PulseResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid_reference_error!(
                input,
                "repository reference is empty",
                "repository_reference"
            ));
        }

        if trimmed.contains("://") {
            return Self::parse_url(input, trimmed);
        }

        let lowered = trimmed.to_ascii_lowercase();
        if ACCEPTED_HOSTS
            .iter()
            .any(|host| lowered.starts_with(&format!("{}/", host)))
        {
            return Self::parse_url(input, &format!("https://{}", trimmed));
        }

        let segments = split_segments(trimmed.trim_end_matches('/'));
        match segments.as_slice() {
            [owner, name] => Self::new(owner, name),
            _ => Err(invalid_reference_error!(
                input,
                "expected a GitHub URL or owner/name",
                "repository_reference"
            )),
        }
    }

    fn parse_url(input: &str, candidate: &str) -> PulseResult<Self> {
        let parsed = Url::parse(candidate).map_err(|e| {
            invalid_reference_error!(input, format!("invalid URL: {}", e), "repository_reference")
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid_reference_error!(
                input,
                format!("unsupported scheme '{}'", parsed.scheme()),
                "repository_reference"
            ));
        }

        let host = parsed.host_str().unwrap_or_default();
        if !ACCEPTED_HOSTS.contains(&host) || parsed.port().is_some() {
            return Err(invalid_reference_error!(
                input,
                format!("'{}' is not a supported repository host", host),
                "repository_reference"
            ));
        }

        let segments = split_segments(parsed.path().trim_end_matches('/'));
        match segments.as_slice() {
            [owner, name] => Self::new(owner, name),
            _ => Err(invalid_reference_error!(
                input,
                "URL must be in format https://github.com/owner/name",
                "repository_reference"
            )),
        }
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.trim_start_matches('/').split('/').collect()
}

impl FromStr for RepositoryReference {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Byte count and derived share of one language
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LanguageShare {
    pub bytes: u64,
    pub percentage: f64,
}

/// Language name to byte count and percentage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct LanguageBreakdown(BTreeMap<String, LanguageShare>);

impl LanguageBreakdown {
    pub fn from_shares(shares: BTreeMap<String, LanguageShare>) -> Self {
        Self(shares)
    }

    pub fn get(&self, language: &str) -> Option<&LanguageShare> {
        self.0.get(language)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LanguageShare)> {
        self.0.iter()
    }

    pub fn total_bytes(&self) -> u64 {
        self.0.values().map(|share| share.bytes).sum()
    }

    pub fn percentage_sum(&self) -> f64 {
        self.0.values().map(|share| share.percentage).sum()
    }

    /// Language with the most bytes; ties resolve to the lexically smallest name
    pub fn primary_language(&self) -> Option<&str> {
        self.0
            .iter()
            .max_by(|(a_name, a), (b_name, b)| a.bytes.cmp(&b.bytes).then(b_name.cmp(a_name)))
            .map(|(name, _)| name.as_str())
    }
}

/// One ranked contributor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ContributorStat {
    pub login: String,
    pub contributions: u64,
    #[serde(default)]
    pub avatar_url: String,
}

/// Activity counts for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CommitActivityBucket {
    /// `YYYY-MM`
    pub period: String,
    pub commits: u32,
    pub issues: u32,
    #[serde(rename = "prs")]
    pub pull_requests: u32,
}

/// Accumulated churn of one path across the sampled commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FileChangeStat {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}

/// Count and share of one file extension in the default tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FileTypeShare {
    pub count: u64,
    pub percentage: f64,
}

/// 0-100 health score and the checks that produced it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthScore {
    pub score: u8,
    pub has_commits: bool,
    pub has_multiple_contributors: bool,
    pub recently_active: bool,
    pub has_active_period: bool,
}

/// Independently fetched parts of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSection {
    Metadata,
    Languages,
    Commits,
    Contributors,
    Issues,
    FileChanges,
    Branches,
    FileTypes,
}

impl SnapshotSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSection::Metadata => "metadata",
            SnapshotSection::Languages => "languages",
            SnapshotSection::Commits => "commits",
            SnapshotSection::Contributors => "contributors",
            SnapshotSection::Issues => "issues",
            SnapshotSection::FileChanges => "file_changes",
            SnapshotSection::Branches => "branches",
            SnapshotSection::FileTypes => "file_types",
        }
    }
}

impl fmt::Display for SnapshotSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A section that exhausted its retries and was left empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SectionFailure {
    pub section: SnapshotSection,
    pub kind: crate::error::ErrorKind,
    pub message: String,
}

/// One complete analysis of one repository at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalysisSnapshot {
    /// Assigned by the history store on create
    pub id: Option<i64>,
    #[serde(flatten)]
    pub reference: RepositoryReference,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub forks: u64,
    #[serde(default)]
    pub watchers: u64,
    /// Repository size in KB as reported upstream
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub open_issues: u64,
    /// When the repository itself was created
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub primary_language: Option<String>,
    #[serde(default)]
    pub languages: LanguageBreakdown,
    #[serde(default)]
    pub top_contributors: Vec<ContributorStat>,
    #[serde(default)]
    pub total_contributors: u64,
    #[serde(default)]
    pub total_commits: u64,
    #[serde(default)]
    pub last_commit_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commit_activity: Vec<CommitActivityBucket>,
    #[serde(default)]
    pub most_modified_files: Vec<FileChangeStat>,
    #[serde(default)]
    pub file_structure: BTreeMap<String, FileTypeShare>,
    #[serde(default)]
    pub branches_count: u64,
    #[serde(default)]
    pub health: HealthScore,
    /// Set when at least one section exhausted its retries
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub degraded_sections: Vec<SectionFailure>,
    /// Sections whose pagination stopped at the configured cap
    #[serde(default)]
    pub truncated_sections: Vec<SnapshotSection>,
    pub analyzed_at: DateTime<Utc>,
    /// Assigned by the history store on create
    #[serde(default)]
    pub stored_at: Option<DateTime<Utc>>,
}

impl AnalysisSnapshot {
    /// An empty snapshot for `reference`, stamped with `analyzed_at`
    pub fn empty(reference: RepositoryReference, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            full_name: reference.full_name(),
            html_url: reference.url.clone(),
            reference,
            description: None,
            avatar_url: String::new(),
            default_branch: String::new(),
            stars: 0,
            forks: 0,
            watchers: 0,
            size: 0,
            open_issues: 0,
            created_at: None,
            primary_language: None,
            languages: LanguageBreakdown::default(),
            top_contributors: Vec::new(),
            total_contributors: 0,
            total_commits: 0,
            last_commit_date: None,
            commit_activity: Vec::new(),
            most_modified_files: Vec::new(),
            file_structure: BTreeMap::new(),
            branches_count: 0,
            health: HealthScore::default(),
            degraded: false,
            degraded_sections: Vec::new(),
            truncated_sections: Vec::new(),
            analyzed_at,
            stored_at: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded || !self.degraded_sections.is_empty()
    }

    pub fn is_section_degraded(&self, section: SnapshotSection) -> bool {
        self.degraded_sections.iter().any(|f| f.section == section)
    }
}

/// Cheap listing view of a stored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalysisSummary {
    pub id: i64,
    pub owner: String,
    pub repo_name: String,
    pub repo_url: String,
    pub stars: u64,
    pub forks: u64,
    pub total_commits: u64,
    pub total_contributors: u64,
    pub primary_language: Option<String>,
    pub degraded: bool,
    pub analyzed_at: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
}

impl AnalysisSummary {
    pub fn from_snapshot(id: i64, stored_at: DateTime<Utc>, snapshot: &AnalysisSnapshot) -> Self {
        Self {
            id,
            owner: snapshot.reference.owner.clone(),
            repo_name: snapshot.reference.name.clone(),
            repo_url: snapshot.reference.url.clone(),
            stars: snapshot.stars,
            forks: snapshot.forks,
            total_commits: snapshot.total_commits,
            total_contributors: snapshot.total_contributors,
            primary_language: snapshot.primary_language.clone(),
            degraded: snapshot.is_degraded(),
            analyzed_at: snapshot.analyzed_at,
            stored_at,
        }
    }
}
