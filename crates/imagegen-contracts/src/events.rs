//! Append-only activity journal for the generation pipeline.
//!
//! Each line is one [`JournalEntry`]: the session id, a microsecond UTC
//! timestamp and the flattened [`JournalEvent`], tagged by `type`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::request::{AspectRatio, Quality};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEvent {
    GenerationStarted {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        aspect_ratio: AspectRatio,
        quality: Quality,
        model: String,
    },
    GenerationSucceeded {
        image_url: String,
        model: String,
        elapsed_ms: u64,
    },
    GenerationFailed {
        error: String,
    },
    HistoryAppended {
        id: String,
        count: usize,
    },
    HistoryImported {
        source: PathBuf,
        count: usize,
    },
    ImageDownloaded {
        url: String,
        path: PathBuf,
        bytes: u64,
    },
}

impl JournalEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            JournalEvent::GenerationStarted { .. } => "generation_started",
            JournalEvent::GenerationSucceeded { .. } => "generation_succeeded",
            JournalEvent::GenerationFailed { .. } => "generation_failed",
            JournalEvent::HistoryAppended { .. } => "history_appended",
            JournalEvent::HistoryImported { .. } => "history_imported",
            JournalEvent::ImageDownloaded { .. } => "image_downloaded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub session_id: String,
    #[serde(serialize_with = "rfc3339_micros")]
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub event: JournalEvent,
}

/// Writes [`JournalEntry`] lines for one session. Clones share the file lock.
#[derive(Debug, Clone)]
pub struct ActivityJournal {
    path: PathBuf,
    session_id: String,
    file_lock: Arc<Mutex<()>>,
}

impl ActivityJournal {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            file_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn append(&self, event: JournalEvent) -> Result<JournalEntry> {
        let entry = JournalEntry {
            session_id: self.session_id.clone(),
            ts: Utc::now().trunc_subsecs(6),
            event,
        };
        let mut line = serde_json::to_string(&entry).context("failed to encode journal entry")?;
        line.push('\n');

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
        }
        let _held = self
            .file_lock
            .lock()
            .map_err(|_| anyhow!("journal writer poisoned"))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("failed appending to {}", self.path.display()))?;
        Ok(entry)
    }

    /// Best-effort [`ActivityJournal::append`]; a failed write is only logged.
    pub fn record(&self, event: JournalEvent) {
        let kind = event.kind();
        if let Err(err) = self.append(event) {
            tracing::warn!(
                path = %self.path.display(),
                kind,
                error = %format!("{err:#}"),
                "activity journal write failed"
            );
        }
    }
}

/// Parses every entry in a journal file. Blank lines are skipped.
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed journal entry", path.display(), idx + 1))
        })
        .collect()
}

fn rfc3339_micros<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}
