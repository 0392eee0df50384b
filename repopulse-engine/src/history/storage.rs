//! History store backends
//!
//! Narrow CRUD boundary for persisted analysis snapshots, with an in-memory
//! backend and a SQLite backend.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use repopulse_core::{
    not_found_error, store_error, AnalysisSnapshot, AnalysisSummary, PulseResult,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Persistence for analysis snapshots.
///
/// Every `create` inserts a new record, even for a repository analyzed before.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist `snapshot`, returning it with its assigned id and storage time.
    /// Any id already present on the input is ignored.
    async fn create(&self, snapshot: AnalysisSnapshot) -> PulseResult<AnalysisSnapshot>;

    /// Summaries, most recently stored first
    async fn list(&self) -> PulseResult<Vec<AnalysisSummary>>;

    async fn get(&self, id: i64) -> PulseResult<AnalysisSnapshot>;

    /// Permanently remove one record
    async fn delete(&self, id: i64) -> PulseResult<()>;

    /// Health check for the storage backend
    async fn health_check(&self) -> PulseResult<()>;

    fn backend_name(&self) -> &'static str;
}

fn history_record(id: i64) -> String {
    format!("analysis {}", id)
}

fn newest_first(a: &AnalysisSummary, b: &AnalysisSummary) -> std::cmp::Ordering {
    b.stored_at.cmp(&a.stored_at).then(b.id.cmp(&a.id))
}

/// In-memory history (default when no database is configured)
pub struct MemoryHistoryStore {
    records: Arc<RwLock<BTreeMap<i64, AnalysisSnapshot>>>,
    next_id: AtomicI64,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn create(&self, mut snapshot: AnalysisSnapshot) -> PulseResult<AnalysisSnapshot> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        snapshot.id = Some(id);
        snapshot.stored_at = Some(Utc::now());

        self.records.write().await.insert(id, snapshot.clone());
        debug!(id = id, repository = %snapshot.reference, "Stored analysis in memory");
        Ok(snapshot)
    }

    async fn list(&self) -> PulseResult<Vec<AnalysisSummary>> {
        let records = self.records.read().await;
        let mut summaries: Vec<AnalysisSummary> = records
            .iter()
            .map(|(id, snapshot)| {
                let stored_at = snapshot.stored_at.unwrap_or(snapshot.analyzed_at);
                AnalysisSummary::from_snapshot(*id, stored_at, snapshot)
            })
            .collect();
        summaries.sort_by(newest_first);
        Ok(summaries)
    }

    async fn get(&self, id: i64) -> PulseResult<AnalysisSnapshot> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error!(history_record(id), "memory_history_store"))
    }

    async fn delete(&self, id: i64) -> PulseResult<()> {
        match self.records.write().await.remove(&id) {
            Some(_) => {
                debug!(id = id, "Deleted analysis from memory");
                Ok(())
            }
            None => Err(not_found_error!(history_record(id), "memory_history_store")),
        }
    }

    async fn health_check(&self) -> PulseResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// SQLite history store
#[cfg(feature = "sqlite")]
pub struct SqliteHistoryStore {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "sqlite")]
impl SqliteHistoryStore {
    pub async fn new(pool: sqlx::SqlitePool) -> PulseResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    /// Connect to `database_url`, creating the database file if needed
    pub async fn from_url(database_url: &str) -> PulseResult<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        info!(database_url = database_url, "Connecting to history database");

        let pool = if database_url.contains(":memory:") {
            // each in-memory connection is its own database
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await
        } else {
            let options = SqliteConnectOptions::from_str(database_url)
                .map_err(|e| store_error!("Invalid database URL", "sqlite_history_store", e))?
                .create_if_missing(true);
            SqlitePoolOptions::new().connect_with(options).await
        }
        .map_err(|e| {
            store_error!(
                format!("Failed to connect to database: {}", e),
                "sqlite_history_store",
                e
            )
        })?;

        Self::new(pool).await
    }

    async fn create_tables(&self) -> PulseResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                repo_name TEXT NOT NULL,
                repo_url TEXT NOT NULL,
                stars INTEGER NOT NULL DEFAULT 0,
                forks INTEGER NOT NULL DEFAULT 0,
                total_commits INTEGER NOT NULL DEFAULT 0,
                total_contributors INTEGER NOT NULL DEFAULT 0,
                primary_language TEXT,
                degraded BOOLEAN NOT NULL DEFAULT 0,
                analyzed_at TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                snapshot TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| store_error!("Failed to create analysis_history table", "sqlite_history_store", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_analysis_history_stored_at ON analysis_history(stored_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| store_error!("Failed to create analysis_history index", "sqlite_history_store", e))?;

        Ok(())
    }

    fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }

    fn parse_timestamp(value: &str) -> PulseResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(|e| store_error!(format!("Corrupt timestamp '{}'", value), "sqlite_history_store", e))
    }

    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> PulseResult<AnalysisSummary> {
        use sqlx::Row;

        let column_error = |e: sqlx::Error| store_error!("Failed to read history row", "sqlite_history_store", e);
        let analyzed_at: String = row.try_get("analyzed_at").map_err(column_error)?;
        let stored_at: String = row.try_get("stored_at").map_err(column_error)?;
        let stars: i64 = row.try_get("stars").map_err(column_error)?;
        let forks: i64 = row.try_get("forks").map_err(column_error)?;
        let total_commits: i64 = row.try_get("total_commits").map_err(column_error)?;
        let total_contributors: i64 = row.try_get("total_contributors").map_err(column_error)?;

        Ok(AnalysisSummary {
            id: row.try_get("id").map_err(column_error)?,
            owner: row.try_get("owner").map_err(column_error)?,
            repo_name: row.try_get("repo_name").map_err(column_error)?,
            repo_url: row.try_get("repo_url").map_err(column_error)?,
            stars: stars.max(0) as u64,
            forks: forks.max(0) as u64,
            total_commits: total_commits.max(0) as u64,
            total_contributors: total_contributors.max(0) as u64,
            primary_language: row.try_get("primary_language").map_err(column_error)?,
            degraded: row.try_get("degraded").map_err(column_error)?,
            analyzed_at: Self::parse_timestamp(&analyzed_at)?,
            stored_at: Self::parse_timestamp(&stored_at)?,
        })
    }
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn create(&self, mut snapshot: AnalysisSnapshot) -> PulseResult<AnalysisSnapshot> {
        let stored_at = Utc::now().trunc_subsecs(6);
        snapshot.id = None;
        snapshot.stored_at = None;
        let snapshot_json = serde_json::to_string(&snapshot)?;

        let result = sqlx::query(
            r#"
            INSERT INTO analysis_history
            (owner, repo_name, repo_url, stars, forks, total_commits, total_contributors,
             primary_language, degraded, analyzed_at, stored_at, snapshot)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.reference.owner)
        .bind(&snapshot.reference.name)
        .bind(&snapshot.reference.url)
        .bind(snapshot.stars as i64)
        .bind(snapshot.forks as i64)
        .bind(snapshot.total_commits as i64)
        .bind(snapshot.total_contributors as i64)
        .bind(&snapshot.primary_language)
        .bind(snapshot.is_degraded())
        .bind(Self::format_timestamp(&snapshot.analyzed_at))
        .bind(Self::format_timestamp(&stored_at))
        .bind(snapshot_json)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error!("Failed to insert analysis", "sqlite_history_store", e))?;

        let id = result.last_insert_rowid();
        snapshot.id = Some(id);
        snapshot.stored_at = Some(stored_at);

        debug!(id = id, repository = %snapshot.reference, "Stored analysis in SQLite");
        Ok(snapshot)
    }

    async fn list(&self) -> PulseResult<Vec<AnalysisSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, repo_name, repo_url, stars, forks, total_commits,
                   total_contributors, primary_language, degraded, analyzed_at, stored_at
            FROM analysis_history
            ORDER BY stored_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error!("Failed to list analyses", "sqlite_history_store", e))?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    async fn get(&self, id: i64) -> PulseResult<AnalysisSnapshot> {
        use sqlx::Row;

        let row = sqlx::query("SELECT stored_at, snapshot FROM analysis_history WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error!("Failed to load analysis", "sqlite_history_store", e))?
            .ok_or_else(|| not_found_error!(history_record(id), "sqlite_history_store"))?;

        let column_error = |e: sqlx::Error| store_error!("Failed to read history row", "sqlite_history_store", e);
        let stored_at: String = row.try_get("stored_at").map_err(column_error)?;
        let snapshot_json: String = row.try_get("snapshot").map_err(column_error)?;

        let mut snapshot: AnalysisSnapshot = serde_json::from_str(&snapshot_json)?;
        snapshot.id = Some(id);
        snapshot.stored_at = Some(Self::parse_timestamp(&stored_at)?);
        Ok(snapshot)
    }

    async fn delete(&self, id: i64) -> PulseResult<()> {
        let result = sqlx::query("DELETE FROM analysis_history WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error!("Failed to delete analysis", "sqlite_history_store", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found_error!(history_record(id), "sqlite_history_store"));
        }

        debug!(id = id, "Deleted analysis from SQLite");
        Ok(())
    }

    async fn health_check(&self) -> PulseResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| store_error!("History database is not reachable", "sqlite_history_store", e))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repopulse_core::{ErrorKind, RepositoryReference};

    fn snapshot(input: &str) -> AnalysisSnapshot {
        let reference = RepositoryReference::parse(input).unwrap();
        let mut snapshot = AnalysisSnapshot::empty(reference, Utc::now());
        snapshot.stars = 42;
        snapshot.total_commits = 7;
        snapshot
    }

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemoryHistoryStore::new();

        let first = store.create(snapshot("octocat/Hello-World")).await.unwrap();
        let second = store.create(snapshot("octocat/Hello-World")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(first.stored_at.is_some());

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(Some(listed[0].id), second.id);

        let loaded = store.get(first.id.unwrap()).await.unwrap();
        assert_eq!(loaded, first);

        store.delete(first.id.unwrap()).await.unwrap();
        let error = store.get(first.id.unwrap()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_ignores_preset_id() {
        let store = MemoryHistoryStore::new();
        let mut input = snapshot("octocat/Spoon-Knife");
        input.id = Some(999);

        let stored = store.create(input).await.unwrap();
        assert_eq!(stored.id, Some(1));
    }

    #[tokio::test]
    async fn test_memory_store_delete_missing() {
        let store = MemoryHistoryStore::default();
        let error = store.delete(12345).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(store.is_empty().await);
    }
}
