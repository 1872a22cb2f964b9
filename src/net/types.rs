//! Wire and domain types shared by the request client and the state store.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by request client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The service answered with a non-success HTTP status.
    #[error("API error: status {status}")]
    Status { status: u16, body: String },

    /// The HTTP request could not be sent or its body could not be read.
    #[error("API request failed: {0}")]
    Request(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The stream init reply carried no idea id to subscribe to.
    #[error("stream init response missing idea id")]
    MissingStreamId,

    /// The push channel failed after it was opened.
    #[error("stream channel failed: {0}")]
    Stream(String),
}

impl ApiError {
    /// HTTP status carried by a transport error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// =============================================================================
// SCORES
// =============================================================================

/// Score assigned when the model output has no parseable `N/10` for a category.
pub const DEFAULT_SCORE: u8 = 50;

/// The three dimensions every idea is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreCategory {
    Originality,
    Scalability,
    Feasibility,
}

impl ScoreCategory {
    pub const ALL: [Self; 3] = [Self::Originality, Self::Scalability, Self::Feasibility];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Originality => "Originality",
            Self::Scalability => "Scalability",
            Self::Feasibility => "Feasibility",
        }
    }

    /// Case-insensitive lookup by category name.
    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(raw))
    }
}

/// Per-category scores on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub originality: u8,
    pub scalability: u8,
    pub feasibility: u8,
}

impl Scores {
    #[must_use]
    pub fn get(&self, category: ScoreCategory) -> u8 {
        match category {
            ScoreCategory::Originality => self.originality,
            ScoreCategory::Scalability => self.scalability,
            ScoreCategory::Feasibility => self.feasibility,
        }
    }

    pub fn set(&mut self, category: ScoreCategory, value: u8) {
        let slot = match category {
            ScoreCategory::Originality => &mut self.originality,
            ScoreCategory::Scalability => &mut self.scalability,
            ScoreCategory::Feasibility => &mut self.feasibility,
        };
        *slot = value.min(100);
    }
}

impl Default for Scores {
    fn default() -> Self {
        Self { originality: DEFAULT_SCORE, scalability: DEFAULT_SCORE, feasibility: DEFAULT_SCORE }
    }
}

/// Display band for a single score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Strong,
    Fair,
    Weak,
}

impl ScoreBand {
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            70..=u8::MAX => Self::Strong,
            40..=69 => Self::Fair,
            _ => Self::Weak,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Fair => "fair",
            Self::Weak => "weak",
        }
    }
}

// =============================================================================
// CRITIQUE
// =============================================================================

/// A rendered review plus its three scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    /// Display-ready markup.
    pub review: String,
    pub scores: Scores,
}

// =============================================================================
// RESPONSE ENVELOPE
// =============================================================================

/// The accepted shapes of a text-bearing response body.
///
/// Resolution order is fixed: bare string, `data` string, `data.content` /
/// `data.text`, top-level `content` / `text`, then the whole body as JSON.
/// Empty strings never satisfy a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Bare(String),
    DataText(String),
    DataField(String),
    Field(String),
    Opaque(Value),
}

impl Envelope {
    #[must_use]
    pub fn classify(body: Value) -> Self {
        match body {
            Value::String(text) => Self::Bare(text),
            Value::Object(map) => {
                match map.get("data") {
                    Some(Value::String(text)) if !text.is_empty() => return Self::DataText(text.clone()),
                    Some(Value::Object(data)) => {
                        if let Some(text) = text_field(data) {
                            return Self::DataField(text);
                        }
                    }
                    _ => {}
                }
                match text_field(&map) {
                    Some(text) => Self::Field(text),
                    None => Self::Opaque(Value::Object(map)),
                }
            }
            other => Self::Opaque(other),
        }
    }

    /// Short name of the matched shape, for logging.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Bare(_) => "bare",
            Self::DataText(_) => "data",
            Self::DataField(_) => "data.field",
            Self::Field(_) => "field",
            Self::Opaque(_) => "opaque",
        }
    }

    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Bare(text) | Self::DataText(text) | Self::DataField(text) | Self::Field(text) => text,
            Self::Opaque(value) => value.to_string(),
        }
    }
}

fn text_field(map: &Map<String, Value>) -> Option<String> {
    ["content", "text"].into_iter().find_map(|key| {
        map.get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(ToOwned::to_owned)
    })
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SubmitIdeaRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CritiqueRequest<'a> {
    pub critique: &'a str,
}

#[derive(Debug, Serialize)]
pub struct StreamInitRequest<'a> {
    pub idea: &'a str,
}

// =============================================================================
// STREAM INIT RESPONSE
// =============================================================================

/// Standard `{ code, message, data }` reply used by the stream init endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Identifier of a stored idea; the backend may send it as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StreamId {
    Number(u64),
    Text(String),
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// The stored idea returned by `/submit-idea-stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamTicket {
    #[serde(default)]
    pub id: Option<StreamId>,
    #[serde(default)]
    pub idea: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
