//! Observable session state.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use crate::net::types::Critique;

/// Snapshot observed by the UI layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppState {
    /// Current input text.
    pub idea: String,
    /// Latest critique; absent until the first successful submission.
    pub critique: Option<Critique>,
    pub is_loading: bool,
    pub is_defending: bool,
    pub is_improving: bool,
    /// Preview markup of an in-flight stream.
    pub streaming_content: String,
    /// Message of the most recent failed action.
    pub last_error: Option<String>,
}

impl AppState {
    /// True while defend or improve is in flight. Both actions are disabled.
    #[must_use]
    pub fn actions_locked(&self) -> bool {
        self.is_defending || self.is_improving
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.is_loading && !self.idea.trim().is_empty()
    }

    /// True when defend or improve would act.
    #[must_use]
    pub fn can_revise(&self) -> bool {
        self.critique.is_some() && !self.actions_locked()
    }
}
