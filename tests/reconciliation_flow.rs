//! End-to-end catalog synchronisation through the job runner
//!
//! A scripted fetcher stands in for the HTTP source; everything else is the
//! production wiring over the in-memory store.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use playlist_sync::{
    config::SchedulerConfig,
    errors::{FetchError, SourceError},
    ingestor::CatalogSyncHandler,
    job_scheduling::{
        Job, JobExecutor, JobPayload, JobQueue, JobQueueRunner, JobState, JobType, TickOutcome,
    },
    models::{CatalogEntry, ChannelRecord, NewScope, ScopeKind},
    repositories::{CatalogStore, InMemoryStore, ScopeStore},
    sources::{DocumentFetcher, m3u::parse_m3u_content},
    utils::{Clock, ManualClock},
};

/// Serves whatever document was last scripted and counts requests
struct ScriptedFetcher {
    document: Mutex<Result<String, String>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(document: &str) -> Self {
        Self {
            document: Mutex::new(Ok(document.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    async fn serve(&self, document: &str) {
        *self.document.lock().await = Ok(document.to_string());
    }

    async fn fail_with(&self, status: u16) {
        *self.document.lock().await = Err(format!("status {status}"));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _url: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ChannelRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.document.lock().await {
            Ok(document) => parse_m3u_content(document),
            Err(message) => Err(SourceError::Http {
                status: 503,
                message: message.clone(),
            }),
        }
    }
}

const FIRST_DOCUMENT: &str = "#EXTM3U
#EXTINF:-1 tvg-id=\"a.news\" group-title=\"news\",A
http://cdn.example.invalid/a/1
#EXTINF:-1 group-title=\"sports\",B
http://cdn.example.invalid/b/2
";

const SECOND_DOCUMENT: &str = "#EXTM3U
#EXTINF:-1 tvg-id=\"a.news\" group-title=\"news\",A
http://cdn.example.invalid/a/1b
#EXTINF:-1 group-title=\"news\",C
http://cdn.example.invalid/c/3
";

struct Harness {
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
    fetcher: Arc<ScriptedFetcher>,
    queue: JobQueue,
    runner: JobQueueRunner,
    token: CancellationToken,
}

impl Harness {
    fn new(document: &str) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let fetcher = Arc::new(ScriptedFetcher::new(document));
        let config = SchedulerConfig::default();

        let handler = Arc::new(CatalogSyncHandler::new(
            store.clone(),
            fetcher.clone(),
            clock.clone(),
        ));
        let executor = JobExecutor::new()
            .register(JobType::ProviderSync, handler.clone())
            .register(JobType::PlaylistSync, handler);
        let runner =
            JobQueueRunner::new(store.clone(), Arc::new(executor), clock.clone(), &config);
        let queue = JobQueue::new(store.clone(), clock.clone(), config);

        Self {
            store,
            clock,
            fetcher,
            queue,
            runner,
            token: CancellationToken::new(),
        }
    }

    async fn add_scope(&self, kind: ScopeKind, is_enabled: bool) -> i64 {
        self.store
            .create_scope(
                NewScope {
                    kind,
                    name: "Home".to_string(),
                    url: "http://lists.example.invalid/home.m3u".to_string(),
                    is_enabled,
                },
                self.clock.now(),
            )
            .await
            .unwrap()
            .id
    }

    /// Enqueue a sync job and run it to its next persisted state
    async fn sync(&self, payload: JobPayload) -> Job {
        self.queue.enqueue(payload, Some(1)).await.unwrap();
        match self.runner.tick(&self.token).await.unwrap() {
            TickOutcome::Resolved(job) => job,
            other => panic!("expected a resolved job, got {other:?}"),
        }
    }

    async fn entries(&self, scope_id: i64) -> Vec<CatalogEntry> {
        let mut entries = self.store.load_entries_for_scope(scope_id).await.unwrap();
        entries.sort_by(|a, b| a.title.cmp(&b.title));
        entries
    }
}

fn playlist(scope_id: i64, destructive: bool) -> JobPayload {
    JobPayload::PlaylistSync {
        scope_id,
        allow_destructive_retirement: destructive,
    }
}

#[tokio::test]
async fn test_initial_sync_adds_every_channel() {
    let harness = Harness::new(FIRST_DOCUMENT);
    let scope_id = harness.add_scope(ScopeKind::Playlist, true).await;

    let job = harness.sync(playlist(scope_id, false)).await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(
        job.status_description.as_deref(),
        Some("Catalog 'Home' synced: 2 added; 0 updated; 0 deactivated")
    );

    let entries = harness.entries(scope_id).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].title, "A");
    assert_eq!(entries[0].group.as_deref(), Some("news"));
    assert_eq!(entries[0].tvg_id.as_deref(), Some("a.news"));
    assert!(entries.iter().all(|entry| entry.is_active));
}

#[tokio::test]
async fn test_update_deactivate_and_add_in_one_pass() {
    let harness = Harness::new(FIRST_DOCUMENT);
    let scope_id = harness.add_scope(ScopeKind::Playlist, true).await;
    harness.sync(playlist(scope_id, false)).await;
    let before = harness.entries(scope_id).await;

    harness.clock.advance(Duration::hours(1));
    harness.fetcher.serve(SECOND_DOCUMENT).await;
    let job = harness.sync(playlist(scope_id, false)).await;

    assert_eq!(
        job.status_description.as_deref(),
        Some("Catalog 'Home' synced: 1 added; 1 updated; 1 deactivated")
    );

    let entries = harness.entries(scope_id).await;
    assert_eq!(entries.len(), 3);

    let a = &entries[0];
    assert_eq!(a.id, before[0].id);
    assert_eq!(a.media_url, "http://cdn.example.invalid/a/1b");
    assert!(a.is_active);
    assert_eq!(a.updated_at, harness.clock.now());

    let b = &entries[1];
    assert_eq!(b.title, "B");
    assert!(!b.is_active);

    let c = &entries[2];
    assert_eq!(c.title, "C");
    assert_eq!(c.group.as_deref(), Some("news"));
    assert!(c.is_active);
}

#[tokio::test]
async fn test_repeated_sync_does_not_duplicate_or_recount() {
    let harness = Harness::new(SECOND_DOCUMENT);
    let scope_id = harness.add_scope(ScopeKind::Playlist, true).await;

    harness.sync(playlist(scope_id, false)).await;
    let job = harness.sync(playlist(scope_id, false)).await;

    assert_eq!(
        job.status_description.as_deref(),
        Some("Catalog 'Home' synced: 0 added; 2 updated; 0 deactivated")
    );
    assert_eq!(harness.entries(scope_id).await.len(), 2);
}

#[tokio::test]
async fn test_destructive_sync_deletes_missing_entries() {
    let harness = Harness::new(FIRST_DOCUMENT);
    let scope_id = harness.add_scope(ScopeKind::Playlist, true).await;
    harness.sync(playlist(scope_id, false)).await;

    harness.fetcher.serve(SECOND_DOCUMENT).await;
    let job = harness.sync(playlist(scope_id, true)).await;

    assert_eq!(
        job.status_description.as_deref(),
        Some("Catalog 'Home' synced: 1 added; 1 updated; 1 deleted")
    );
    let titles: Vec<String> = harness
        .entries(scope_id)
        .await
        .into_iter()
        .map(|entry| entry.title)
        .collect();
    assert_eq!(titles, vec!["A".to_string(), "C".to_string()]);
}

#[tokio::test]
async fn test_disabled_scope_is_refused_before_fetching() {
    let harness = Harness::new(FIRST_DOCUMENT);
    let scope_id = harness.add_scope(ScopeKind::Provider, false).await;

    let job = harness
        .sync(JobPayload::ProviderSync {
            scope_id,
            allow_destructive_retirement: false,
        })
        .await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(
        job.status_description.as_deref(),
        Some("Service provider is not enabled")
    );
    assert_eq!(harness.fetcher.calls(), 0);
    assert!(harness.entries(scope_id).await.is_empty());
}

#[tokio::test]
async fn test_missing_scope_fails_gracefully() {
    let harness = Harness::new(FIRST_DOCUMENT);

    let job = harness.sync(playlist(42, false)).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempt_count, 1);
    assert_eq!(
        job.status_description.as_deref(),
        Some("Playlist 42 does not exist")
    );
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_scope_kind_must_match_job_type() {
    let harness = Harness::new(FIRST_DOCUMENT);
    let scope_id = harness.add_scope(ScopeKind::Provider, true).await;

    let job = harness.sync(playlist(scope_id, false)).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_fetch_fault_is_retried_and_leaves_catalog_untouched() {
    let harness = Harness::new(FIRST_DOCUMENT);
    let scope_id = harness.add_scope(ScopeKind::Playlist, true).await;
    harness.sync(playlist(scope_id, false)).await;
    let before = harness.entries(scope_id).await;

    harness.fetcher.fail_with(503).await;
    harness
        .queue
        .enqueue(playlist(scope_id, false), Some(2))
        .await
        .unwrap();

    let TickOutcome::Resolved(first) = harness.runner.tick(&harness.token).await.unwrap() else {
        panic!("expected the job to be processed");
    };
    assert_eq!(first.state, JobState::Queued);
    assert_eq!(
        first.status_description.as_deref(),
        Some("Error processing job (attempt 1 of 2). Queued for retry")
    );

    let TickOutcome::Resolved(second) = harness.runner.tick(&harness.token).await.unwrap() else {
        panic!("expected the retry to be processed");
    };
    assert_eq!(second.id, first.id);
    assert_eq!(second.state, JobState::Failed);
    assert_eq!(second.attempt_count, 2);
    assert!(
        second
            .status_description
            .as_deref()
            .unwrap_or_default()
            .ends_with("Last attempt reached, job will not be retried")
    );

    assert_eq!(harness.entries(scope_id).await, before);
}

#[tokio::test]
async fn test_blank_and_duplicate_records_are_ignored() {
    let document = "#EXTM3U
#EXTINF:-1 group-title=\"news\",A
http://cdn.example.invalid/a/first
#EXTINF:-1 group-title=\"news\",A
http://cdn.example.invalid/a/second
#EXTINF:-1 group-title=\"news\",
http://cdn.example.invalid/untitled
";
    let harness = Harness::new(document);
    let scope_id = harness.add_scope(ScopeKind::Playlist, true).await;

    let job = harness.sync(playlist(scope_id, false)).await;

    assert_eq!(
        job.status_description.as_deref(),
        Some("Catalog 'Home' synced: 1 added; 0 updated; 0 deactivated")
    );
    let entries = harness.entries(scope_id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].media_url, "http://cdn.example.invalid/a/first");
}
