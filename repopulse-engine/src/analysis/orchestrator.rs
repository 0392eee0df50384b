//! Analysis orchestrator
//!
//! Fans one request out into independent sub-fetches, reduces each result as it
//! arrives and assembles the snapshot once every section has settled.

use super::errors::{AnalysisError, AnalysisResult};
use chrono::{Duration as ChronoDuration, Utc};
use repopulse_core::{
    performance, AnalysisConfig, AnalysisSnapshot, ErrorKind, FileChangeStat, FileTypeShare,
    LanguageBreakdown, PulseError, PulseResult, RepositoryReference, SectionFailure,
    SnapshotSection,
};
use repopulse_repo::{
    aggregate_languages, build_activity_series, collect_pages, derive_health,
    file_type_distribution, last_commit_at, rank_contributors, rank_file_changes,
    CommitRecord, ContributorRanking, HealthSignals, IssueRecord, PageCursor, RepositoryMetadata,
    UpstreamClient,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Result of one sub-fetch, already reduced where the reduction needs only its own data
enum SectionOutcome {
    Metadata(PulseResult<RepositoryMetadata>),
    Languages(PulseResult<LanguageBreakdown>),
    Commits(PulseResult<Listing<CommitRecord>>),
    Contributors(PulseResult<(ContributorRanking, bool)>),
    Issues(PulseResult<Listing<IssueRecord>>),
    FileChanges(PulseResult<(Vec<FileChangeStat>, bool)>),
    Branches(PulseResult<(u64, bool)>),
    FileTypes(PulseResult<(BTreeMap<String, FileTypeShare>, bool)>),
}

struct Listing<T> {
    items: Vec<T>,
    truncated: bool,
}

/// Coordinates the upstream client and the aggregators for one analysis
#[derive(Clone)]
pub struct Analyzer {
    client: Arc<dyn UpstreamClient>,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(client: Arc<dyn UpstreamClient>, config: AnalysisConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one repository within `timeout`.
    ///
    /// Sections other than metadata degrade independently. On timeout every
    /// in-flight sub-fetch is aborted.
    pub async fn analyze(
        &self,
        reference: &RepositoryReference,
        timeout: Duration,
    ) -> AnalysisResult<AnalysisSnapshot> {
        let mut tasks = self.spawn_sections(reference);
        debug!(
            repository = %reference,
            sections = tasks.len(),
            "Spawned analysis sub-fetches"
        );

        let settled = tokio::time::timeout(timeout, Self::settle(&mut tasks)).await;
        let assembly = match settled {
            Ok(Ok(assembly)) => assembly,
            Ok(Err(error)) => {
                tasks.abort_all();
                return Err(error);
            }
            Err(_) => {
                tasks.abort_all();
                warn!(
                    repository = %reference,
                    timeout_ms = timeout.as_millis() as u64,
                    "Analysis timed out, aborted in-flight sub-fetches"
                );
                return Err(AnalysisError::UpstreamUnavailable {
                    message: format!(
                        "analysis of {} did not finish within {}s",
                        reference,
                        timeout.as_secs_f64()
                    ),
                    cause: ErrorKind::Timeout,
                });
            }
        };

        Ok(performance::measure_sync("assemble_snapshot", || {
            assembly.finish(reference.clone(), &self.config)
        }))
    }

    fn spawn_sections(&self, reference: &RepositoryReference) -> JoinSet<SectionOutcome> {
        let mut tasks = JoinSet::new();
        let precision = self.config.percentage_precision;
        let since = self
            .config
            .commit_since_days
            .map(|days| Utc::now() - ChronoDuration::days(i64::from(days)));

        let (client, reference_owned) = (Arc::clone(&self.client), reference.clone());
        tasks.spawn(async move {
            SectionOutcome::Metadata(client.fetch_metadata(&reference_owned).await)
        });

        let (client, reference_owned) = (Arc::clone(&self.client), reference.clone());
        tasks.spawn(async move {
            SectionOutcome::Languages(
                client
                    .fetch_languages(&reference_owned)
                    .await
                    .map(|bytes| aggregate_languages(&bytes, precision)),
            )
        });

        let (client, reference_owned) = (Arc::clone(&self.client), reference.clone());
        tasks.spawn(async move {
            SectionOutcome::Commits(client.fetch_commits(&reference_owned, since).await.map(
                |page| Listing {
                    items: page.items,
                    truncated: page.truncated,
                },
            ))
        });

        let (client, reference_owned) = (Arc::clone(&self.client), reference.clone());
        let top_contributors = self.config.top_contributors;
        tasks.spawn(async move {
            SectionOutcome::Contributors(client.fetch_contributors(&reference_owned).await.map(
                |page| (rank_contributors(page.items, top_contributors), page.truncated),
            ))
        });

        let (client, reference_owned) = (Arc::clone(&self.client), reference.clone());
        tasks.spawn(async move {
            SectionOutcome::Issues(client.fetch_issues(&reference_owned).await.map(|page| {
                Listing {
                    items: page.items,
                    truncated: page.truncated,
                }
            }))
        });

        let (client, reference_owned) = (Arc::clone(&self.client), reference.clone());
        let (sample_size, top_files) = (self.config.file_sample_size, self.config.top_files);
        tasks.spawn(async move {
            SectionOutcome::FileChanges(
                sample_file_changes(client.as_ref(), &reference_owned, sample_size, top_files)
                    .await,
            )
        });

        let (client, reference_owned) = (Arc::clone(&self.client), reference.clone());
        tasks.spawn(async move {
            SectionOutcome::Branches(
                client
                    .fetch_branches(&reference_owned)
                    .await
                    .map(|page| (page.items.len() as u64, page.truncated)),
            )
        });

        let (client, reference_owned) = (Arc::clone(&self.client), reference.clone());
        tasks.spawn(async move {
            SectionOutcome::FileTypes(client.fetch_file_tree(&reference_owned).await.map(|tree| {
                (
                    file_type_distribution(&tree.entries, precision),
                    tree.truncated,
                )
            }))
        });

        tasks
    }

    async fn settle(tasks: &mut JoinSet<SectionOutcome>) -> AnalysisResult<SnapshotAssembly> {
        let mut assembly = SnapshotAssembly::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| {
                AnalysisError::internal(format!("analysis sub-fetch did not complete: {}", e))
            })?;
            assembly.absorb(outcome)?;
        }
        Ok(assembly)
    }
}

/// Rank per-file churn over the most recent `sample_size` commits.
///
/// The flag is set when the history holds more commits than the sample, so the
/// ranking is approximate. The newest page is requested again here rather than
/// shared with the commits sub-fetch, which keeps both sections independent.
async fn sample_file_changes(
    client: &dyn UpstreamClient,
    reference: &RepositoryReference,
    sample_size: usize,
    top_files: usize,
) -> PulseResult<(Vec<FileChangeStat>, bool)> {
    if sample_size == 0 {
        return Ok((Vec::new(), false));
    }

    let per_page = sample_size.min(client.limits().per_page.max(1) as usize) as u32;
    let max_pages = sample_size.div_ceil(per_page as usize) as u32;
    let recent = collect_pages(PageCursor::first(per_page), max_pages, |cursor| {
        client.fetch_commits_page(reference, None, cursor)
    })
    .await?;

    let truncated = recent.truncated || recent.items.len() > sample_size;
    let sample: Vec<String> = recent
        .items
        .into_iter()
        .take(sample_size)
        .map(|commit| commit.sha)
        .collect();
    if sample.is_empty() {
        return Ok((Vec::new(), truncated));
    }

    let details = client.fetch_file_change_stats(reference, &sample).await?;
    Ok((rank_file_changes(&details, top_files), truncated))
}

/// Sections collected so far for one analysis
#[derive(Default)]
struct SnapshotAssembly {
    metadata: Option<RepositoryMetadata>,
    languages: LanguageBreakdown,
    contributors: Option<ContributorRanking>,
    commits: Vec<CommitRecord>,
    commits_available: bool,
    issues: Vec<IssueRecord>,
    file_changes: Vec<FileChangeStat>,
    branch_count: u64,
    file_types: BTreeMap<String, FileTypeShare>,
    failures: Vec<SectionFailure>,
    truncated: BTreeSet<SnapshotSection>,
}

impl SnapshotAssembly {
    fn absorb(&mut self, outcome: SectionOutcome) -> AnalysisResult<()> {
        match outcome {
            SectionOutcome::Metadata(result) => {
                self.metadata = Some(result.map_err(AnalysisError::from_metadata_failure)?);
            }
            SectionOutcome::Languages(result) => {
                if let Some(languages) = self.settle_section(SnapshotSection::Languages, result) {
                    self.languages = languages;
                }
            }
            SectionOutcome::Commits(result) => {
                if let Some(listing) = self.settle_section(SnapshotSection::Commits, result) {
                    self.mark_truncated(SnapshotSection::Commits, listing.truncated);
                    self.commits = listing.items;
                    self.commits_available = true;
                }
            }
            SectionOutcome::Contributors(result) => {
                if let Some((ranking, truncated)) =
                    self.settle_section(SnapshotSection::Contributors, result)
                {
                    self.mark_truncated(SnapshotSection::Contributors, truncated);
                    self.contributors = Some(ranking);
                }
            }
            SectionOutcome::Issues(result) => {
                if let Some(listing) = self.settle_section(SnapshotSection::Issues, result) {
                    self.mark_truncated(SnapshotSection::Issues, listing.truncated);
                    self.issues = listing.items;
                }
            }
            SectionOutcome::FileChanges(result) => {
                if let Some((files, truncated)) =
                    self.settle_section(SnapshotSection::FileChanges, result)
                {
                    self.mark_truncated(SnapshotSection::FileChanges, truncated);
                    self.file_changes = files;
                }
            }
            SectionOutcome::Branches(result) => {
                if let Some((count, truncated)) =
                    self.settle_section(SnapshotSection::Branches, result)
                {
                    self.mark_truncated(SnapshotSection::Branches, truncated);
                    self.branch_count = count;
                }
            }
            SectionOutcome::FileTypes(result) => {
                if let Some((distribution, truncated)) =
                    self.settle_section(SnapshotSection::FileTypes, result)
                {
                    self.mark_truncated(SnapshotSection::FileTypes, truncated);
                    self.file_types = distribution;
                }
            }
        }
        Ok(())
    }

    fn settle_section<T>(&mut self, section: SnapshotSection, result: PulseResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(
                    section = %section,
                    kind = %error.kind(),
                    error = %error,
                    "Section degraded"
                );
                self.failures.push(section_failure(section, &error));
                None
            }
        }
    }

    fn mark_truncated(&mut self, section: SnapshotSection, truncated: bool) {
        if truncated {
            self.truncated.insert(section);
        }
    }

    fn finish(mut self, reference: RepositoryReference, config: &AnalysisConfig) -> AnalysisSnapshot {
        let analyzed_at = Utc::now();
        let mut snapshot = AnalysisSnapshot::empty(reference, analyzed_at);

        if let Some(metadata) = self.metadata.take() {
            if !metadata.full_name.is_empty() {
                snapshot.full_name = metadata.full_name;
            }
            if !metadata.html_url.is_empty() {
                snapshot.html_url = metadata.html_url;
            }
            snapshot.description = metadata.description;
            snapshot.avatar_url = metadata.owner_avatar_url;
            snapshot.default_branch = metadata.default_branch;
            snapshot.stars = metadata.stars;
            snapshot.forks = metadata.forks;
            snapshot.watchers = metadata.watchers;
            snapshot.size = metadata.size;
            snapshot.open_issues = metadata.open_issues;
            snapshot.created_at = metadata.created_at;
            snapshot.primary_language = metadata.language;
        }

        if let Some(primary) = self.languages.primary_language() {
            snapshot.primary_language = Some(primary.to_string());
        }
        snapshot.languages = self.languages;

        if let Some(ranking) = self.contributors {
            snapshot.total_contributors = ranking.total;
            snapshot.top_contributors = ranking.top;
        }

        if self.commits_available {
            snapshot.total_commits = self.commits.len() as u64;
            snapshot.last_commit_date = last_commit_at(&self.commits);
            snapshot.commit_activity = build_activity_series(&self.commits, &self.issues);
        }

        snapshot.most_modified_files = self.file_changes;
        snapshot.file_structure = self.file_types;
        snapshot.branches_count = self.branch_count;

        snapshot.health = derive_health(HealthSignals {
            total_commits: snapshot.total_commits,
            total_contributors: snapshot.total_contributors,
            last_commit_at: snapshot.last_commit_date,
            activity: &snapshot.commit_activity,
            analyzed_at,
            recent_window_days: config.recent_activity_days,
        });

        self.failures.sort_by_key(|failure| failure.section);
        snapshot.degraded = !self.failures.is_empty();
        snapshot.degraded_sections = self.failures;
        snapshot.truncated_sections = self.truncated.into_iter().collect();
        snapshot
    }
}

fn section_failure(section: SnapshotSection, error: &PulseError) -> SectionFailure {
    SectionFailure {
        section,
        kind: error.kind(),
        message: error.to_string(),
    }
}
