// tests/engine_cycle.rs
//
// Full cycles against fake sources, a recording transport and a temp state file.
//
// Covered:
// - first cycle: dedupe, denylist, cap of 5, everything recorded
// - rerun with unchanged pages sends nothing
// - one source failing does not stop the others
// - suppression and cap decisions are permanent
// - transport failure still commits state
// - corrupt or locked state aborts before anything is sent

mod common;

use std::sync::Arc;

use common::*;
use release_watch::delivery::{DeliveryState, StateStore};
use release_watch::engine::CyclePhase;
use release_watch::error::MonitorError;
use release_watch::notify::NotifyOutcome;
use tempfile::TempDir;

fn state_store(dir: &TempDir) -> StateStore {
    StateStore::new(dir.path().join("state").join("delivered.json"))
}

fn notes_only() -> Arc<FakeFetcher> {
    Arc::new(FakeFetcher::new().with_page(RELEASE_NOTES_URL, RELEASE_NOTES_HTML))
}

#[tokio::test]
async fn first_cycle_sends_five_and_records_all_seven() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let engine = engine(
        notes_only(),
        Some(transport.clone()),
        state_store(&dir),
        settings(&["pricing", "education", "student", "teacher"], 5),
    );

    let report = engine.run_cycle(&[release_notes_source()]).await.unwrap();

    assert_eq!(report.unique, 7);
    assert_eq!(report.suppressed, 1);
    assert_eq!(report.batch.len(), 5);
    assert_eq!(report.deferred, 1);
    assert_eq!(report.delivered_before, 0);
    assert_eq!(report.delivered_after, 7);
    assert!(matches!(report.notify, NotifyOutcome::Sent(_)));

    let batch_titles: Vec<&str> = report.batch.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        batch_titles,
        vec![
            "Dev Mode annotations",
            "Variables in prototypes",
            "Auto layout wrap",
            "Faster file loading",
            "Figma Slides templates",
        ]
    );

    let sent = transport.sent();
    assert_eq!(sent.len(), 1, "one message per cycle");
    assert!(sent[0].contains("### 5. [Update] Figma Slides templates"));
    assert!(!sent[0].contains("Pricing"));
    assert!(!sent[0].contains("Grid view"));

    let persisted = engine.store().load().unwrap();
    assert!(persisted.contains("May 5, 2025-Updated Pricing for Organization plans"));
    assert!(persisted.contains("April 29, 2025-Grid view for components"));
}

#[tokio::test]
async fn cycle_visits_every_phase_in_order() {
    let dir = TempDir::new().unwrap();
    let engine = engine(notes_only(), None, state_store(&dir), settings(&[], 5));
    let report = engine.run_cycle(&[release_notes_source()]).await.unwrap();
    assert_eq!(
        report.phases,
        vec![
            CyclePhase::Loading,
            CyclePhase::FetchingAll,
            CyclePhase::Deduplicating,
            CyclePhase::Filtering,
            CyclePhase::Batching,
            CyclePhase::Notifying,
            CyclePhase::Persisting,
            CyclePhase::Idle,
        ]
    );
    assert!(matches!(report.notify, NotifyOutcome::DryRun(_)));
}

#[tokio::test]
async fn rerun_on_unchanged_pages_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let engine = engine(
        notes_only(),
        Some(transport.clone()),
        state_store(&dir),
        settings(&["pricing"], 5),
    );
    let sources = [release_notes_source()];

    engine.run_cycle(&sources).await.unwrap();
    let second = engine.run_cycle(&sources).await.unwrap();

    assert!(second.batch.is_empty());
    assert!(matches!(second.notify, NotifyOutcome::Empty));
    assert_eq!(second.already_delivered, 7);
    assert_eq!(second.delivered_before, second.delivered_after);
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn failing_source_does_not_block_the_rest() {
    let dir = TempDir::new().unwrap();
    // Release notes URL is not served: fetch fails.
    let fetcher = Arc::new(FakeFetcher::new().with_page(BLOG_URL, BLOG_HTML));
    let transport = Arc::new(RecordingTransport::default());
    let engine = engine(
        fetcher,
        Some(transport.clone()),
        state_store(&dir),
        settings(&["pricing"], 5),
    );

    let report = engine
        .run_cycle(&[release_notes_source(), blog_source()])
        .await
        .unwrap();

    assert_eq!(report.sources.len(), 2);
    assert!(report.sources[0].error.is_some());
    assert_eq!(report.sources[1].candidates, 5);
    assert_eq!(report.batch.len(), 5);
    assert_eq!(report.delivered_after, 5);
    assert!(transport.sent()[0].contains("[Blog] Config 2025 recap"));
}

#[tokio::test]
async fn suppressed_and_deferred_items_never_come_back() {
    let dir = TempDir::new().unwrap();
    let store = state_store(&dir);
    let strict = engine(notes_only(), None, store.clone(), settings(&["pricing"], 5));
    strict.run_cycle(&[release_notes_source()]).await.unwrap();

    // Denylist cleared and cap raised: still nothing new.
    let relaxed = engine(notes_only(), None, store, settings(&[], 50));
    let report = relaxed.run_cycle(&[release_notes_source()]).await.unwrap();
    assert!(report.batch.is_empty());
    assert_eq!(report.suppressed, 0);
}

#[tokio::test]
async fn new_entry_on_next_cycle_is_the_only_one_sent() {
    let dir = TempDir::new().unwrap();
    let fetcher = notes_only();
    let transport = Arc::new(RecordingTransport::default());
    let engine = engine(
        fetcher.clone(),
        Some(transport.clone()),
        state_store(&dir),
        settings(&["pricing"], 5),
    );
    let sources = [release_notes_source()];
    engine.run_cycle(&sources).await.unwrap();

    let updated = RELEASE_NOTES_HTML.replace(
        "<h1>Release notes</h1>",
        r#"<h1>Release notes</h1>
           <div class="release-note"><time>May 9, 2025</time><h2>Branching for everyone</h2><p>Now on all plans.</p></div>"#,
    );
    fetcher.set_page(RELEASE_NOTES_URL, &updated);

    let report = engine.run_cycle(&sources).await.unwrap();
    assert_eq!(report.batch.len(), 1);
    assert_eq!(report.batch.items()[0].title, "Branching for everyone");
    assert_eq!(report.delivered_after, report.delivered_before + 1);
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn duplicates_across_sources_are_sent_once() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_page(RELEASE_NOTES_URL, RELEASE_NOTES_HTML)
            .with_page("https://mirror.test/notes", RELEASE_NOTES_HTML),
    );
    let mirror = release_watch::config::SourceProfile::new(
        "Mirror",
        "https://mirror.test/notes",
        release_watch::config::SourceKind::ReleaseNotes,
    );
    let engine = engine(fetcher, None, state_store(&dir), settings(&[], 20));
    let report = engine
        .run_cycle(&[release_notes_source(), mirror])
        .await
        .unwrap();
    assert_eq!(report.unique, 7);
    assert!(report.batch.iter().all(|i| i.source_name == "Release Notes"));
}

#[tokio::test]
async fn disabled_sources_are_not_fetched() {
    let dir = TempDir::new().unwrap();
    let fetcher = notes_only();
    let engine = engine(fetcher.clone(), None, state_store(&dir), settings(&[], 5));
    let report = engine
        .run_cycle(&[release_notes_source().disabled()])
        .await
        .unwrap();
    assert_eq!(fetcher.calls(), 0);
    assert!(report.sources.is_empty());
    assert!(matches!(report.notify, NotifyOutcome::Empty));
}

#[tokio::test]
async fn transport_failure_still_commits_state() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::failing());
    let engine = engine(
        notes_only(),
        Some(transport.clone()),
        state_store(&dir),
        settings(&[], 5),
    );
    let report = engine.run_cycle(&[release_notes_source()]).await.unwrap();
    match &report.notify {
        NotifyOutcome::Failed { error, message } => {
            assert!(error.contains("502"));
            assert_eq!(message.sections.len(), 5);
        }
        other => panic!("expected failure, got {}", other.label()),
    }
    assert_eq!(engine.store().load().unwrap().len(), 7);
}

#[tokio::test]
async fn corrupt_state_aborts_before_sending() {
    let dir = TempDir::new().unwrap();
    let store = state_store(&dir);
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "{ not json").unwrap();

    let transport = Arc::new(RecordingTransport::default());
    let engine = engine(notes_only(), Some(transport.clone()), store.clone(), settings(&[], 5));
    let err = engine.run_cycle(&[release_notes_source()]).await.unwrap_err();

    assert!(matches!(err, MonitorError::StateCorrupt { .. }));
    assert!(err.is_fatal());
    assert!(transport.sent().is_empty());
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{ not json");
    assert!(!store.lock_path().exists(), "lock released on error");
}

#[tokio::test]
async fn concurrent_run_is_refused() {
    let dir = TempDir::new().unwrap();
    let store = state_store(&dir);
    let _held = store.lock().unwrap();

    let engine = engine(notes_only(), None, store.clone(), settings(&[], 5));
    let err = engine.run_cycle(&[release_notes_source()]).await.unwrap_err();
    assert!(matches!(err, MonitorError::StateLocked { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn stale_lock_from_killed_run_does_not_block_cycles() {
    let dir = TempDir::new().unwrap();
    let store = state_store(&dir);
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let dead = child.id();
    child.wait().unwrap();
    std::fs::write(store.lock_path(), format!("{dead}\n")).unwrap();

    let engine = engine(notes_only(), None, store.clone(), settings(&[], 5));
    for _ in 0..3 {
        engine.run_cycle(&[release_notes_source()]).await.unwrap();
    }
    assert_eq!(store.load().unwrap().len(), 7);
    assert!(!store.lock_path().exists());
}

#[tokio::test]
async fn prior_state_is_respected() {
    let dir = TempDir::new().unwrap();
    let store = state_store(&dir);
    let prior: DeliveryState = [
        "May 7, 2025-Dev Mode annotations",
        "May 6, 2025-Variables in prototypes",
    ]
    .into_iter()
    .collect();
    store.persist(&prior).unwrap();

    let engine = engine(notes_only(), None, store, settings(&["pricing"], 5));
    let report = engine.run_cycle(&[release_notes_source()]).await.unwrap();
    assert_eq!(report.already_delivered, 2);
    assert_eq!(report.batch.len(), 4);
    assert_eq!(report.batch.items()[0].title, "Auto layout wrap");
    assert_eq!(report.deferred, 0);
}
