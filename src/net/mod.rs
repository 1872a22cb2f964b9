//! Request client for the critique service.
//!
//! DESIGN
//! ======
//! [`CritiqueApi`] is the seam between the state store and the network. The
//! HTTP implementation is [`api::ApiClient`]; tests drive the store through
//! hand-written mocks of the same trait.

pub mod api;
pub mod sse;
pub mod stream;
pub mod types;

pub use api::ApiClient;
pub use stream::{ChunkCallback, CompleteCallback, StreamHandle};
pub use types::{ApiError, Critique, Scores};

/// Async critique operations. Enables mocking in tests.
#[async_trait::async_trait]
pub trait CritiqueApi: Send + Sync {
    /// Submit an idea and return the formatted critique.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    async fn submit(&self, idea: &str) -> Result<Critique, ApiError>;

    /// Send a review to the defend endpoint and return display-ready markup.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    async fn defend(&self, review: &str) -> Result<String, ApiError>;

    /// Send a review to the improve endpoint and return display-ready markup.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    async fn improve(&self, review: &str) -> Result<String, ApiError>;

    /// Register the idea for streaming and open the push channel.
    ///
    /// `on_chunk` receives preview markup for every fragment. `on_complete`
    /// fires once with the final critique, on the sentinel or on channel
    /// failure, unless the returned handle is aborted first.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the init request fails or its reply
    /// carries no idea id. Failures after the channel opens are reported
    /// through `on_complete` instead.
    async fn stream_submit(
        &self,
        idea: &str,
        on_chunk: ChunkCallback,
        on_complete: CompleteCallback,
    ) -> Result<StreamHandle, ApiError>;
}
