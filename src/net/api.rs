//! HTTP implementation of [`CritiqueApi`].

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::CritiqueApi;
use super::stream::{ChunkCallback, CompleteCallback, StreamHandle, spawn_relay};
use super::types::{
    ApiError, ApiResponse, Critique, CritiqueRequest, Envelope, StreamInitRequest, StreamTicket, SubmitIdeaRequest,
};
use crate::config::ClientConfig;
use crate::format::{format_critique, format_review};

const SUBMIT_PATH: &str = "/submit-idea";
const DEFEND_PATH: &str = "/defend-idea";
const IMPROVE_PATH: &str = "/improve-idea";
const STREAM_INIT_PATH: &str = "/submit-idea-stream";
const STREAM_PATH: &str = "/stream/submit-idea";

pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Build a client for `config`.
    ///
    /// The total request timeout is applied per JSON call so that the push
    /// channel can stay open for as long as the service keeps writing.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST a JSON body and return the raw response text.
    async fn post_json(&self, path: &str, body: &impl Serialize) -> Result<String, ApiError> {
        let url = self.config.endpoint(path);
        let response = self
            .http
            .post(url)
            .timeout(self.config.timeouts.request())
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Status { status, body: text });
        }
        Ok(text)
    }

    /// POST and resolve the text payload of the response envelope.
    async fn post_for_text(&self, path: &str, body: &impl Serialize) -> Result<String, ApiError> {
        let raw = self.post_json(path, body).await?;
        Ok(normalize_body(path, raw))
    }
}

/// Resolve the text payload of a response body. A body that is not JSON is
/// taken verbatim.
fn normalize_body(path: &str, raw: String) -> String {
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => {
            let envelope = Envelope::classify(value);
            debug!(path, shape = envelope.shape(), "api: resolved response envelope");
            envelope.into_text()
        }
        Err(e) => {
            warn!(path, error = %e, "api: response is not JSON; using raw body");
            raw
        }
    }
}

#[async_trait::async_trait]
impl CritiqueApi for ApiClient {
    async fn submit(&self, idea: &str) -> Result<Critique, ApiError> {
        let text = self.post_for_text(SUBMIT_PATH, &SubmitIdeaRequest { text: idea }).await?;
        let critique = format_critique(&text);
        info!(
            originality = critique.scores.originality,
            scalability = critique.scores.scalability,
            feasibility = critique.scores.feasibility,
            "api: critique received"
        );
        Ok(critique)
    }

    async fn defend(&self, review: &str) -> Result<String, ApiError> {
        let text = self.post_for_text(DEFEND_PATH, &CritiqueRequest { critique: review }).await?;
        Ok(format_review(&text))
    }

    async fn improve(&self, review: &str) -> Result<String, ApiError> {
        let text = self.post_for_text(IMPROVE_PATH, &CritiqueRequest { critique: review }).await?;
        Ok(format_review(&text))
    }

    async fn stream_submit(
        &self,
        idea: &str,
        on_chunk: ChunkCallback,
        on_complete: CompleteCallback,
    ) -> Result<StreamHandle, ApiError> {
        let raw = self.post_json(STREAM_INIT_PATH, &StreamInitRequest { idea }).await?;
        let reply: ApiResponse<StreamTicket> =
            serde_json::from_str(&raw).map_err(|_| ApiError::MissingStreamId)?;
        let stream_id = reply
            .data
            .and_then(|ticket| ticket.id)
            .ok_or(ApiError::MissingStreamId)?
            .to_string();

        info!(%stream_id, message = %reply.message, "api: stream registered");
        let request = self
            .http
            .get(self.config.endpoint(&format!("{STREAM_PATH}/{stream_id}")))
            .header(reqwest::header::ACCEPT, "text/event-stream");
        Ok(spawn_relay(request, stream_id, on_chunk, on_complete))
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
