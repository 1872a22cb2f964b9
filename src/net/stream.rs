//! Push-channel relay for streamed critiques.
//!
//! The relay owns the SSE response on a background task. Fragments are
//! accumulated and forwarded as preview markup; the completion callback
//! receives the critique built from the whole text, exactly once, after the
//! response has been dropped.

use futures_util::StreamExt;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::sse::SseDecoder;
use super::types::{ApiError, Critique};
use crate::format::{format_critique, format_stream_preview};

/// Data payload that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Receives preview markup for the text accumulated so far.
pub type ChunkCallback = Box<dyn FnMut(String) + Send>;

/// Receives the final critique.
pub type CompleteCallback = Box<dyn FnOnce(Critique) + Send>;

/// Handle to a running relay task. Aborting severs the channel; no callback
/// fires afterwards.
#[derive(Debug)]
pub struct StreamHandle {
    abort: AbortHandle,
}

impl StreamHandle {
    #[must_use]
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort }
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Accumulates stream fragments.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    text: String,
}

impl StreamAssembler {
    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn preview(&self) -> String {
        format_stream_preview(&self.text)
    }

    #[must_use]
    pub fn finish(self) -> Critique {
        format_critique(&self.text)
    }
}

/// Open the push channel described by `request` on a background task.
pub fn spawn_relay(
    request: reqwest::RequestBuilder,
    stream_id: String,
    mut on_chunk: ChunkCallback,
    on_complete: CompleteCallback,
) -> StreamHandle {
    let task = tokio::spawn(async move {
        let mut assembler = StreamAssembler::default();
        match read_events(request, &mut assembler, &mut on_chunk).await {
            Ok(true) => info!(%stream_id, chars = assembler.text().len(), "stream: completed"),
            Ok(false) => warn!(%stream_id, "stream: ended without sentinel"),
            Err(e) => warn!(%stream_id, error = %e, "stream: channel failed"),
        }
        on_complete(assembler.finish());
    });
    StreamHandle::new(task.abort_handle())
}

/// Relay events until the sentinel or the end of the channel. Returns
/// whether the sentinel was seen. The response is dropped before returning.
async fn read_events(
    request: reqwest::RequestBuilder,
    assembler: &mut StreamAssembler,
    on_chunk: &mut ChunkCallback,
) -> Result<bool, ApiError> {
    let response = request.send().await.map_err(|e| ApiError::Stream(e.to_string()))?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Stream(format!("status {status}: {body}")));
    }

    let mut bytes_stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    while let Some(chunk_result) = bytes_stream.next().await {
        let chunk = chunk_result.map_err(|e| ApiError::Stream(e.to_string()))?;
        for data in decoder.push(&chunk) {
            if relay_event(&data, assembler, on_chunk) {
                return Ok(true);
            }
        }
    }

    Ok(decoder.finish().is_some_and(|data| relay_event(&data, assembler, on_chunk)))
}

/// Apply one event. Returns true on the sentinel.
fn relay_event(data: &str, assembler: &mut StreamAssembler, on_chunk: &mut ChunkCallback) -> bool {
    if data == DONE_SENTINEL {
        return true;
    }
    debug!(len = data.len(), "stream: fragment");
    assembler.push(data);
    on_chunk(assembler.preview());
    false
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;
