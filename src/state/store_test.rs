use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::time::Duration;

use tokio::sync::Notify;

use super::*;
use crate::format::{format_critique, format_review};
use crate::net::stream::StreamAssembler;
use crate::net::types::{Critique, Scores};

const SCORED_CRITIQUE: &str = "Originality: 3/10\nScalability: 6/10\nFeasibility: 8/10";

// =============================================================
// Mock request client
// =============================================================

#[derive(Default)]
struct MockApi {
    raw: String,
    fragments: Vec<String>,
    fail: AtomicBool,
    gate_submit: bool,
    gate_revise: bool,
    gate_stream: bool,
    gate: Arc<Notify>,
    submit_calls: AtomicUsize,
    defend_calls: AtomicUsize,
    improve_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    stream_completed: Arc<AtomicBool>,
}

impl MockApi {
    fn scored() -> Self {
        Self { raw: SCORED_CRITIQUE.into(), ..Self::default() }
    }

    fn streaming(fragments: &[&str]) -> Self {
        Self { fragments: fragments.iter().map(ToString::to_string).collect(), ..Self::default() }
    }

    fn outcome<T>(&self, ok: impl FnOnce() -> T) -> Result<T, ApiError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(ApiError::Status { status: 500, body: "model offline".into() })
        } else {
            Ok(ok())
        }
    }

    async fn wait_gate(&self, gated: bool) {
        if gated {
            self.gate.notified().await;
        }
    }
}

#[async_trait::async_trait]
impl CritiqueApi for MockApi {
    async fn submit(&self, _idea: &str) -> Result<Critique, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate(self.gate_submit).await;
        self.outcome(|| format_critique(&self.raw))
    }

    async fn defend(&self, _review: &str) -> Result<String, ApiError> {
        self.defend_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate(self.gate_revise).await;
        self.outcome(|| format_review("Defended."))
    }

    async fn improve(&self, _review: &str) -> Result<String, ApiError> {
        self.improve_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate(self.gate_revise).await;
        self.outcome(|| format_review("Improved."))
    }

    async fn stream_submit(
        &self,
        _idea: &str,
        mut on_chunk: ChunkCallback,
        on_complete: CompleteCallback,
    ) -> Result<StreamHandle, ApiError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(|| ())?;

        let fragments = self.fragments.clone();
        let gated = self.gate_stream;
        let gate = self.gate.clone();
        let completed = self.stream_completed.clone();
        let task = tokio::spawn(async move {
            let mut assembler = StreamAssembler::default();
            for fragment in &fragments {
                assembler.push(fragment);
                on_chunk(assembler.preview());
            }
            if gated {
                gate.notified().await;
            }
            completed.store(true, Ordering::SeqCst);
            on_complete(assembler.finish());
        });
        Ok(StreamHandle::new(task.abort_handle()))
    }
}

fn store_with(api: MockApi) -> (AppStore, Arc<MockApi>) {
    let api = Arc::new(api);
    (AppStore::new(api.clone()), api)
}

async fn wait_until(store: &AppStore, predicate: impl FnMut(&AppState) -> bool) {
    let mut rx = store.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .unwrap()
        .unwrap();
}

async fn with_critique(api: MockApi) -> (AppStore, Arc<MockApi>) {
    let (store, api) = store_with(api);
    store.set_idea("self-watering plant pots");
    store.submit_idea().await;
    assert!(store.snapshot().critique.is_some());
    (store, api)
}

// =============================================================
// submit
// =============================================================

#[tokio::test]
async fn submit_blank_idea_is_noop() {
    let (store, api) = store_with(MockApi::scored());
    store.set_idea("   ");
    store.submit_idea().await;

    assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.snapshot(), AppState { idea: "   ".into(), ..AppState::default() });
}

#[tokio::test]
async fn submit_success_sets_critique_and_scores() {
    let (store, api) = store_with(MockApi::scored());
    store.set_idea("self-watering plant pots");
    store.submit_idea().await;

    let state = store.snapshot();
    assert_eq!(api.submit_calls.load(Ordering::SeqCst), 1);
    assert!(!state.is_loading);
    let critique = state.critique.unwrap();
    assert_eq!(critique.scores, Scores { originality: 30, scalability: 60, feasibility: 80 });
    assert!(critique.review.contains("<h3>Originality</h3>"));
}

#[tokio::test]
async fn submit_failure_records_error_and_keeps_critique() {
    let (store, api) = with_critique(MockApi::scored()).await;
    let before = store.snapshot().critique;

    api.fail.store(true, Ordering::SeqCst);
    store.submit_idea().await;

    let state = store.snapshot();
    assert!(!state.is_loading);
    assert_eq!(state.critique, before);
    assert!(state.last_error.unwrap().contains("500"));
}

#[tokio::test]
async fn submit_failure_without_prior_critique() {
    let (store, api) = store_with(MockApi::scored());
    api.fail.store(true, Ordering::SeqCst);
    store.set_idea("x");
    store.submit_idea().await;

    let state = store.snapshot();
    assert!(state.critique.is_none());
    assert!(!state.is_loading);
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn second_submit_while_loading_is_noop() {
    let (store, api) = store_with(MockApi { gate_submit: true, ..MockApi::scored() });
    store.set_idea("x");

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.submit_idea().await }
    });
    wait_until(&store, |state| state.is_loading).await;

    store.submit_idea().await;
    assert_eq!(api.submit_calls.load(Ordering::SeqCst), 1);

    api.gate.notify_one();
    first.await.unwrap();
    assert!(!store.snapshot().is_loading);
    assert!(store.snapshot().critique.is_some());
}

// =============================================================
// defend / improve
// =============================================================

#[tokio::test]
async fn defend_without_critique_is_noop() {
    let (store, api) = store_with(MockApi::scored());
    store.defend_idea().await;
    store.improve_idea().await;

    assert_eq!(api.defend_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.improve_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.snapshot(), AppState::default());
}

#[tokio::test]
async fn defend_replaces_review_and_keeps_scores() {
    let (store, _api) = with_critique(MockApi::scored()).await;
    let scores = store.snapshot().critique.unwrap().scores;

    store.defend_idea().await;

    let state = store.snapshot();
    assert!(!state.is_defending);
    let critique = state.critique.unwrap();
    assert_eq!(critique.review, "<p>Defended.</p>\n");
    assert_eq!(critique.scores, scores);
}

#[tokio::test]
async fn improve_replaces_review_and_keeps_scores() {
    let (store, _api) = with_critique(MockApi::scored()).await;
    store.improve_idea().await;

    let critique = store.snapshot().critique.unwrap();
    assert_eq!(critique.review, "<p>Improved.</p>\n");
    assert_eq!(critique.scores, Scores { originality: 30, scalability: 60, feasibility: 80 });
}

#[tokio::test]
async fn improve_failure_clears_only_busy_flag() {
    let (store, api) = with_critique(MockApi::scored()).await;
    let before = store.snapshot().critique;

    api.fail.store(true, Ordering::SeqCst);
    store.improve_idea().await;

    let state = store.snapshot();
    assert!(!state.is_improving);
    assert_eq!(state.critique, before);
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn defend_while_defending_is_noop() {
    let (store, api) = with_critique(MockApi { gate_revise: true, ..MockApi::scored() }).await;

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.defend_idea().await }
    });
    wait_until(&store, |state| state.is_defending).await;
    assert!(store.snapshot().actions_locked());

    store.defend_idea().await;
    assert_eq!(api.defend_calls.load(Ordering::SeqCst), 1);

    api.gate.notify_one();
    first.await.unwrap();
    assert!(!store.snapshot().actions_locked());
}

// =============================================================
// reset
// =============================================================

#[tokio::test]
async fn reset_clears_everything() {
    let (store, _api) = with_critique(MockApi::scored()).await;
    store.reset();
    assert_eq!(store.snapshot(), AppState::default());
}

#[tokio::test]
async fn reset_during_submit_drops_stale_completion() {
    let (store, api) = store_with(MockApi { gate_submit: true, ..MockApi::scored() });
    store.set_idea("x");

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.submit_idea().await }
    });
    wait_until(&store, |state| state.is_loading).await;

    store.reset();
    api.gate.notify_one();
    pending.await.unwrap();

    assert_eq!(store.snapshot(), AppState::default());
}

#[tokio::test]
async fn reset_during_defend_drops_stale_completion() {
    let (store, api) = with_critique(MockApi { gate_revise: true, ..MockApi::scored() }).await;

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.defend_idea().await }
    });
    wait_until(&store, |state| state.is_defending).await;

    store.reset();
    api.gate.notify_one();
    pending.await.unwrap();

    assert_eq!(store.snapshot(), AppState::default());
}

// =============================================================
// streaming
// =============================================================

#[tokio::test]
async fn streaming_updates_content_then_completes() {
    let (store, api) = store_with(MockApi { gate_stream: true, ..MockApi::streaming(&["Hello", " world"]) });
    store.set_idea("x");
    store.submit_idea_streaming().await;

    wait_until(&store, |state| state.streaming_content == "<p>Hello world</p>\n").await;
    assert!(store.snapshot().is_loading);

    api.gate.notify_one();
    wait_until(&store, |state| !state.is_loading).await;

    let state = store.snapshot();
    assert!(state.streaming_content.is_empty());
    assert_eq!(state.critique.unwrap().review, "<p>Hello world</p>\n");
}

#[tokio::test]
async fn streaming_scores_from_complete_text() {
    let (store, _api) = store_with(MockApi::streaming(&["Originality: 7", "/10"]));
    store.set_idea("x");
    store.submit_idea_streaming().await;

    wait_until(&store, |state| state.critique.is_some()).await;
    let scores = store.snapshot().critique.unwrap().scores;
    assert_eq!(scores, Scores { originality: 70, scalability: 50, feasibility: 50 });
}

#[tokio::test]
async fn streaming_ignored_while_loading() {
    let (store, api) = store_with(MockApi { gate_stream: true, ..MockApi::streaming(&["a"]) });
    store.set_idea("x");
    store.submit_idea_streaming().await;
    store.submit_idea_streaming().await;

    assert_eq!(api.stream_calls.load(Ordering::SeqCst), 1);
    api.gate.notify_one();
    wait_until(&store, |state| !state.is_loading).await;
}

#[tokio::test]
async fn streaming_init_failure_clears_loading() {
    let (store, api) = store_with(MockApi::streaming(&["a"]));
    api.fail.store(true, Ordering::SeqCst);
    store.set_idea("x");
    store.submit_idea_streaming().await;

    let state = store.snapshot();
    assert!(!state.is_loading);
    assert!(state.streaming_content.is_empty());
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn reset_aborts_active_stream() {
    let (store, api) = store_with(MockApi { gate_stream: true, ..MockApi::streaming(&["partial"]) });
    store.set_idea("x");
    store.submit_idea_streaming().await;
    wait_until(&store, |state| !state.streaming_content.is_empty()).await;

    store.reset();
    api.gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!api.stream_completed.load(Ordering::SeqCst));
    assert_eq!(store.snapshot(), AppState::default());
}
