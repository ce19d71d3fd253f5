use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("api key not set: ${0}")]
    MissingApiKey(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model returned no candidates")]
    Empty,
    #[error("could not decode model output: {0}")]
    Decode(#[from] serde_json::Error),
    /// Raised by non-HTTP implementations (tests, local fakes).
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("read/write {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("parse {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Upstream artifact a stage needs but cannot find.
#[derive(Debug, Error)]
pub enum MissingInput {
    #[error("no transcript recorded for file path {0}")]
    TranscriptByPath(String),
    #[error("no transcript recorded for meeting {0}")]
    TranscriptByTitle(String),
    #[error("transcript for {0} has no text")]
    EmptyTranscript(String),
    #[error("{} not found", .0.display())]
    File(PathBuf),
}
