//! Append-only journal of committed batches
//!
//! Provides durable storage for the ledger with:
//! - One JSON line per committed batch, fsynced before the batch is applied
//! - Full replay on startup to rebuild in-memory state
//! - Tolerance for a torn final line left by a crash mid-append
//! - A failed append is truncated away; if that fails too the journal
//!   refuses every later append

use acb_common::{
    AcbError, CreditBadge, CreditScore, Loan, LpPosition, Pool, Transaction, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Journal failures
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt journal {path} at line {line}: {reason}")]
    Corrupt {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Journal {path} poisoned: a failed append could not be rolled back")]
    Poisoned { path: String },
}

impl From<JournalError> for AcbError {
    fn from(err: JournalError) -> Self {
        AcbError::Storage(err.to_string())
    }
}

/// Every row written by one committed write transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitBatch {
    /// Commit sequence, starting at 1
    pub sequence: u64,
    pub committed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<User>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credit_scores: Vec<CreditScore>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lp_positions: Vec<LpPosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loans: Vec<Loan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<CreditBadge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<Pool>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.credit_scores.is_empty()
            && self.lp_positions.is_empty()
            && self.loans.is_empty()
            && self.transactions.is_empty()
            && self.badges.is_empty()
            && self.pool.is_none()
    }
}

/// Events stored in the journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LedgerEvent {
    /// A write transaction committed
    Committed(CommitBatch),
}

/// Durable sink for committed batches
#[async_trait]
pub trait Journal: Send + Sync {
    /// Persist an event; must be durable when this returns Ok
    async fn append(&self, event: &LedgerEvent) -> Result<(), JournalError>;

    /// All events in append order
    async fn replay(&self) -> Result<Vec<LedgerEvent>, JournalError>;
}

struct JournalFile {
    file: File,
    /// Set when a failed append left bytes that could not be removed
    poisoned: bool,
}

/// JSON Lines journal file
pub struct FileJournal {
    path: PathBuf,
    state: Mutex<JournalFile>,
    #[cfg(test)]
    fault: parking_lot::Mutex<Option<Fault>>,
}

/// Injected append failures
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Only the first `keep` bytes reach the file
    TornWrite { keep: usize },
    /// The whole line is written but the fsync fails
    SyncFailure,
    /// A torn write whose truncation fails as well
    Unrecoverable { keep: usize },
}

impl FileJournal {
    /// Open (or create) the journal at `path`
    ///
    /// A torn final line from an earlier crash is cut off so the next
    /// append starts on a line boundary.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let len = file.metadata().await?.len();
        if len > 0 {
            let content = tokio::fs::read(&path).await?;
            if content.last() != Some(&b'\n') {
                let keep = content
                    .iter()
                    .rposition(|b| *b == b'\n')
                    .map_or(0, |i| i + 1) as u64;
                warn!(
                    path = %path.display(),
                    dropped_bytes = len - keep,
                    "Truncating torn journal tail"
                );
                file.set_len(keep).await?;
                file.sync_all().await?;
            }
        }

        info!(path = %path.display(), "Opened ledger journal");

        Ok(Self {
            path,
            state: Mutex::new(JournalFile {
                file,
                poisoned: false,
            }),
            #[cfg(test)]
            fault: parking_lot::Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn inject(&self, fault: Fault) {
        *self.fault.lock() = Some(fault);
    }

    async fn write_line(&self, file: &mut File, line: &[u8]) -> std::io::Result<()> {
        #[cfg(test)]
        {
            let fault = *self.fault.lock();
            match fault {
                Some(Fault::TornWrite { keep }) | Some(Fault::Unrecoverable { keep }) => {
                    file.write_all(&line[..keep.min(line.len())]).await?;
                    file.flush().await?;
                    return Err(injected());
                }
                Some(Fault::SyncFailure) => {
                    file.write_all(line).await?;
                    file.flush().await?;
                    return Err(injected());
                }
                None => {}
            }
        }

        file.write_all(line).await?;
        file.sync_data().await
    }

    /// Cut the file back to `len` bytes and make that durable
    async fn truncate(&self, file: &mut File, len: u64) -> std::io::Result<()> {
        #[cfg(test)]
        {
            let fault = self.fault.lock().take();
            if let Some(Fault::Unrecoverable { .. }) = fault {
                return Err(injected());
            }
        }

        file.set_len(len).await?;
        file.sync_all().await
    }
}

#[cfg(test)]
fn injected() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "injected journal fault")
}

#[async_trait]
impl Journal for FileJournal {
    /// All or nothing: on failure the file is cut back to its prior length
    async fn append(&self, event: &LedgerEvent) -> Result<(), JournalError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut state = self.state.lock().await;
        if state.poisoned {
            return Err(JournalError::Poisoned {
                path: self.path.display().to_string(),
            });
        }

        let start = state.file.metadata().await?.len();
        let err = match self.write_line(&mut state.file, &line).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        match self.truncate(&mut state.file, start).await {
            Ok(()) => {
                warn!(path = %self.path.display(), error = %err, "Journal append failed, rolled back");
            }
            Err(rollback) => {
                state.poisoned = true;
                error!(
                    path = %self.path.display(),
                    error = %err,
                    rollback_error = %rollback,
                    "Journal append failed and could not be rolled back"
                );
            }
        }
        Err(err.into())
    }

    async fn replay(&self) -> Result<Vec<LedgerEvent>, JournalError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut events = Vec::with_capacity(lines.len());

        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEvent>(line) {
                Ok(event) => events.push(event),
                // A crash between write and fsync can leave half a line at the end
                Err(e) if idx + 1 == lines.len() && !content.ends_with('\n') => {
                    warn!(
                        path = %self.path.display(),
                        line = idx + 1,
                        error = %e,
                        "Ignoring torn final journal line"
                    );
                }
                Err(e) => {
                    return Err(JournalError::Corrupt {
                        path: self.path.display().to_string(),
                        line: idx + 1,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(path = %self.path.display(), events = events.len(), "Read journal");
        Ok(events)
    }
}
