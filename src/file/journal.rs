//! Write-ahead intent journal for multi-store operations.
//!
//! Before touching the blob store, the file manager records what it is about
//! to do. The entry is removed once both stores agree again. Entries that
//! survive a crash, or a failed compensation, are replayed by
//! [`FileManager::recover`](super::FileManager::recover).
//!
//! Each entry is one JSON file in the journal directory:
//! ```text
//! {journal_dir}/
//! ├── 6f1c...e2.json   {"token":"6f1c...e2","intent":{"op":"upload",...},...}
//! └── 91aa...07.json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

const ENTRY_EXTENSION: &str = "json";

/// An operation that spans both stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Intent {
    /// A blob is about to be written at `storage_path`.
    Upload { storage_path: String },
    /// The blob at `storage_path` and the record `id` are about to be removed.
    Delete { id: String, storage_path: String },
}

/// Handle of a recorded intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentToken(String);

impl IntentToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub token: IntentToken,
    pub intent: Intent,
    pub recorded_at: DateTime<Utc>,
}

/// Directory-backed intent journal.
#[derive(Debug, Clone)]
pub struct IntentJournal {
    dir: PathBuf,
}

impl IntentJournal {
    /// Open the journal in `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::info!(path = %dir.display(), "Opened intent journal");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, token: &IntentToken) -> PathBuf {
        self.dir.join(format!("{token}.{ENTRY_EXTENSION}"))
    }

    /// Durably record `intent`.
    pub async fn begin(&self, intent: Intent, recorded_at: DateTime<Utc>) -> Result<IntentToken> {
        let token = IntentToken::generate();
        let entry = JournalEntry {
            token: token.clone(),
            intent,
            recorded_at,
        };
        let json = serde_json::to_vec(&entry)?;

        let path = self.entry_path(&token);
        let temp_path = self.dir.join(format!("{token}.tmp"));
        if let Err(e) = tokio::fs::write(&temp_path, &json).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::trace!(%token, intent = ?entry.intent, "Recorded intent");
        Ok(token)
    }

    /// Remove a recorded intent. Completing an unknown token is a no-op.
    pub async fn complete(&self, token: &IntentToken) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(token)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All outstanding intents, oldest first.
    ///
    /// Unreadable entries are logged and skipped.
    pub async fn pending(&self) -> Result<Vec<JournalEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read journal entry");
                    continue;
                }
            };
            match serde_json::from_slice::<JournalEntry>(&bytes) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt journal entry");
                }
            }
        }

        entries.sort_by(|a, b| {
            a.recorded_at
                .cmp(&b.recorded_at)
                .then_with(|| a.token.0.cmp(&b.token.0))
        });
        Ok(entries)
    }
}
