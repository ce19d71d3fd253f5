// meeting-features/src/store.rs

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use tracing::warn;

use crate::{error::StoreError, fsutil::write_atomic};

/// Name of the per-meeting record file.
pub const STORE_FILE: &str = "database.json";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptRecord {
    pub id: u64,
    pub filepath: String,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert { Created, Updated }

/// A JSON array of transcripts, one file per meeting folder.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptStore {
    pub records: Vec<TranscriptRecord>,
}

impl TranscriptStore {
    /// Missing or blank file loads as an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() { return Ok(Self::default()); }
        let data = fs::read_to_string(path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        if data.trim().is_empty() { return Ok(Self::default()); }
        serde_json::from_str(&data).map_err(|source| StoreError::Json { path: path.to_path_buf(), source })
    }

    /// Like [`load`](Self::load), but an unreadable store starts over empty.
    pub fn load_or_reset(path: &Path) -> Result<Self, StoreError> {
        match Self::load(path) {
            Err(StoreError::Json { source, .. }) => {
                warn!(path = %path.display(), error = %source, "transcript store is invalid; starting a new one");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let io = |source| StoreError::Io { path: path.to_path_buf(), source };
        let text = serde_json::to_string_pretty(self).map_err(|source| StoreError::Json { path: path.to_path_buf(), source })?;
        write_atomic(path, &text).map_err(io)
    }

    pub fn find_by_file_path(&self, filepath: &str) -> Option<&TranscriptRecord> {
        self.records.iter().find(|r| r.filepath == filepath)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&TranscriptRecord> {
        self.records.iter().find(|r| r.title == title)
    }

    /// Replace the text of the record titled `title`, or append a new one.
    pub fn upsert(&mut self, title: &str, filepath: &str, text: String) -> Upsert {
        let now = Utc::now().to_rfc3339();
        if let Some(r) = self.records.iter_mut().find(|r| r.title == title) {
            r.text = text;
            r.filepath = filepath.to_string();
            r.updated_at = now;
            return Upsert::Updated;
        }
        self.records.push(TranscriptRecord {
            id: self.records.len() as u64 + 1,
            filepath: filepath.to_string(),
            title: title.to_string(),
            text,
            summary: None,
            created_at: now.clone(),
            updated_at: now,
        });
        Upsert::Created
    }

    /// Returns false when no record carries `title`.
    pub fn set_summary(&mut self, title: &str, summary: String) -> bool {
        match self.records.iter_mut().find(|r| r.title == title) {
            Some(r) => {
                r.summary = Some(summary);
                r.updated_at = Utc::now().to_rfc3339();
                true
            }
            None => false,
        }
    }
}

pub fn store_path(meeting_dir: &Path) -> PathBuf {
    meeting_dir.join(STORE_FILE)
}
