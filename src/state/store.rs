//! Shared store driving a critique session.
//!
//! DESIGN
//! ======
//! `AppState` lives in a `tokio::sync::watch` channel: every mutation goes
//! through the sender, observers hold receivers and always see the latest
//! snapshot. Actions set their busy flag before the request is awaited and
//! clear it in the completion path.
//!
//! Each action captures the store generation when it starts. `reset` bumps
//! the generation under the same lock that replaces the state, and every
//! completion re-checks it under that lock, so a late reply from before a
//! reset is dropped instead of repopulating the cleared state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info};

use super::app::AppState;
use crate::net::stream::{ChunkCallback, CompleteCallback, StreamHandle};
use crate::net::types::{ApiError, Critique};
use crate::net::CritiqueApi;

/// Handle to the session store. Clones share one state.
#[derive(Clone)]
pub struct AppStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: watch::Sender<AppState>,
    api: Arc<dyn CritiqueApi>,
    generation: AtomicU64,
    stream: Mutex<Option<StreamHandle>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Revision {
    Defend,
    Improve,
}

impl Revision {
    fn label(self) -> &'static str {
        match self {
            Self::Defend => "defend",
            Self::Improve => "improve",
        }
    }

    fn busy_flag(self, state: &mut AppState) -> &mut bool {
        match self {
            Self::Defend => &mut state.is_defending,
            Self::Improve => &mut state.is_improving,
        }
    }
}

impl AppStore {
    #[must_use]
    pub fn new(api: Arc<dyn CritiqueApi>) -> Self {
        let (state, _) = watch::channel(AppState::default());
        Self {
            inner: Arc::new(StoreInner { state, api, generation: AtomicU64::new(0), stream: Mutex::new(None) }),
        }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> AppState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.inner.state.subscribe()
    }

    pub fn set_idea(&self, idea: impl Into<String>) {
        let idea = idea.into();
        self.inner.state.send_modify(|state| state.idea = idea);
    }

    /// Submit the current idea and wait for the critique.
    ///
    /// No-op when the idea is blank or a submission is already loading.
    pub async fn submit_idea(&self) {
        let Some((idea, generation)) = self.begin(|state| {
            if !state.can_submit() {
                return None;
            }
            state.is_loading = true;
            state.last_error = None;
            Some(state.idea.clone())
        }) else {
            debug!("store: submit ignored");
            return;
        };

        match self.inner.api.submit(&idea).await {
            Ok(critique) => {
                self.apply(generation, |state| {
                    state.critique = Some(critique);
                    state.is_loading = false;
                });
            }
            Err(e) => {
                error!(error = %e, "store: submit failed");
                self.fail(generation, &e, |state| state.is_loading = false);
            }
        }
    }

    /// Submit the current idea over the push channel.
    ///
    /// Returns once the channel is open; chunks and the final critique
    /// arrive through the store afterwards.
    pub async fn submit_idea_streaming(&self) {
        let Some((idea, generation)) = self.begin(|state| {
            if !state.can_submit() {
                return None;
            }
            state.is_loading = true;
            state.streaming_content.clear();
            state.last_error = None;
            Some(state.idea.clone())
        }) else {
            debug!("store: streaming submit ignored");
            return;
        };

        let chunk_store = self.clone();
        let on_chunk: ChunkCallback = Box::new(move |preview: String| {
            chunk_store.apply(generation, |state| state.streaming_content = preview);
        });
        let complete_store = self.clone();
        let on_complete: CompleteCallback = Box::new(move |critique: Critique| {
            let applied = complete_store.apply(generation, |state| {
                state.critique = Some(critique);
                state.is_loading = false;
                state.streaming_content.clear();
            });
            if !applied {
                debug!(generation, "store: stale stream completion dropped");
            }
        });

        match self.inner.api.stream_submit(&idea, on_chunk, on_complete).await {
            Ok(handle) => self.track_stream(generation, handle),
            Err(e) => {
                error!(error = %e, "store: stream init failed");
                self.fail(generation, &e, |state| {
                    state.is_loading = false;
                    state.streaming_content.clear();
                });
            }
        }
    }

    /// Ask the service to defend the current critique.
    pub async fn defend_idea(&self) {
        self.revise(Revision::Defend).await;
    }

    /// Ask the service to improve the idea based on the current critique.
    pub async fn improve_idea(&self) {
        self.revise(Revision::Improve).await;
    }

    /// Return to the initial state and sever any active stream.
    pub fn reset(&self) {
        self.inner.state.send_modify(|state| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *state = AppState::default();
        });
        if let Some(handle) = self.lock_stream().take() {
            handle.abort();
        }
        info!("store: reset");
    }

    async fn revise(&self, revision: Revision) {
        let Some((review, generation)) = self.begin(|state| {
            let review = state.critique.as_ref()?.review.clone();
            let busy = revision.busy_flag(state);
            if *busy {
                return None;
            }
            *busy = true;
            state.last_error = None;
            Some(review)
        }) else {
            debug!(action = revision.label(), "store: revision ignored");
            return;
        };

        let result = match revision {
            Revision::Defend => self.inner.api.defend(&review).await,
            Revision::Improve => self.inner.api.improve(&review).await,
        };
        match result {
            Ok(text) => {
                self.apply(generation, |state| {
                    *revision.busy_flag(state) = false;
                    if let Some(critique) = state.critique.as_mut() {
                        critique.review = text;
                    }
                });
            }
            Err(e) => {
                error!(action = revision.label(), error = %e, "store: revision failed");
                self.fail(generation, &e, |state| *revision.busy_flag(state) = false);
            }
        }
    }

    /// Run `start` against the state; when it returns a value the change is
    /// published and the current generation is captured with it.
    fn begin<T>(&self, start: impl FnOnce(&mut AppState) -> Option<T>) -> Option<(T, u64)> {
        let mut started = None;
        self.inner.state.send_if_modified(|state| {
            started = start(state).map(|value| (value, self.inner.generation.load(Ordering::SeqCst)));
            started.is_some()
        });
        started
    }

    /// Apply a completion unless the store was reset since `generation`.
    fn apply(&self, generation: u64, update: impl FnOnce(&mut AppState)) -> bool {
        self.inner.state.send_if_modified(|state| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(state);
            true
        })
    }

    fn fail(&self, generation: u64, e: &ApiError, clear: impl FnOnce(&mut AppState)) {
        let message = e.to_string();
        self.apply(generation, |state| {
            clear(state);
            state.last_error = Some(message);
        });
    }

    fn track_stream(&self, generation: u64, handle: StreamHandle) {
        let mut slot = self.lock_stream();
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            handle.abort();
            return;
        }
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    fn lock_stream(&self) -> std::sync::MutexGuard<'_, Option<StreamHandle>> {
        self.inner.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
