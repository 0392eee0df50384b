//! SQLite history store against a temporary database file

#![cfg(feature = "sqlite")]

use chrono::{TimeZone, Utc};
use repopulse_core::{
    AnalysisSnapshot, ErrorKind, LanguageBreakdown, LanguageShare, RepositoryReference,
    SectionFailure, SnapshotSection,
};
use repopulse_engine::{HistoryStore, SqliteHistoryStore};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn snapshot(input: &str, stars: u64) -> AnalysisSnapshot {
    let reference = RepositoryReference::parse(input).unwrap();
    let analyzed_at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
    let mut snapshot = AnalysisSnapshot::empty(reference, analyzed_at);
    snapshot.stars = stars;
    snapshot.total_commits = 120;
    snapshot.primary_language = Some("Rust".to_string());
    snapshot.languages = LanguageBreakdown::from_shares(BTreeMap::from([(
        "Rust".to_string(),
        LanguageShare {
            bytes: 1024,
            percentage: 100.0,
        },
    )]));
    snapshot
}

async fn open_store(dir: &TempDir) -> SqliteHistoryStore {
    let path = dir.path().join("history.db");
    let url = format!("sqlite://{}", path.display());
    SqliteHistoryStore::from_url(&url).await.unwrap()
}

#[tokio::test]
async fn test_create_get_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let stored = store.create(snapshot("octocat/Hello-World", 42)).await.unwrap();
    let id = stored.id.unwrap();

    let loaded = store.get(id).await.unwrap();
    assert_eq!(loaded, stored);
    assert_eq!(loaded.languages.get("Rust").unwrap().bytes, 1024);
    assert_eq!(store.backend_name(), "sqlite");
    store.health_check().await.unwrap();
}

#[tokio::test]
async fn test_list_newest_first_with_summary_fields() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let mut degraded = snapshot("octocat/Spoon-Knife", 7);
    degraded.degraded = true;
    degraded.degraded_sections = vec![SectionFailure {
        section: SnapshotSection::Contributors,
        kind: ErrorKind::RateLimited,
        message: "API rate limit exceeded".to_string(),
    }];

    let first = store.create(snapshot("octocat/Hello-World", 42)).await.unwrap();
    let second = store.create(degraded).await.unwrap();

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(Some(listed[0].id), second.id);
    assert_eq!(Some(listed[1].id), first.id);
    assert!(listed[0].degraded);
    assert_eq!(listed[0].repo_name, "Spoon-Knife");
    assert_eq!(listed[1].stars, 42);
    assert_eq!(listed[1].total_commits, 120);
    assert_eq!(listed[1].primary_language.as_deref(), Some("Rust"));
}

#[tokio::test]
async fn test_delete_and_missing_records() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let stored = store.create(snapshot("octocat/Hello-World", 1)).await.unwrap();
    let id = stored.id.unwrap();

    store.delete(id).await.unwrap();
    assert_eq!(store.get(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.delete(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let store = open_store(&dir).await;
        store
            .create(snapshot("octocat/Hello-World", 3))
            .await
            .unwrap()
            .id
            .unwrap()
    };

    let reopened = open_store(&dir).await;
    let loaded = reopened.get(id).await.unwrap();
    assert_eq!(loaded.reference.owner, "octocat");

    // ids are never reused after deletion
    reopened.delete(id).await.unwrap();
    let next = reopened
        .create(snapshot("octocat/Hello-World", 3))
        .await
        .unwrap();
    assert!(next.id.unwrap() > id);
}

#[tokio::test]
async fn test_in_memory_database_url() {
    let store = SqliteHistoryStore::from_url("sqlite::memory:").await.unwrap();
    let stored = store.create(snapshot("octocat/Hello-World", 5)).await.unwrap();
    assert_eq!(store.list().await.unwrap().len(), 1);
    assert_eq!(store.get(stored.id.unwrap()).await.unwrap().stars, 5);
}
