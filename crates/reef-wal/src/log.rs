//! [`WriteAheadLog`] implementation over an append-only file.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use reef_types::{WalOp, WalRecord};
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::WalError;

type Result<T> = std::result::Result<T, WalError>;

/// Counters collected while replaying a log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Non-blank lines read.
    pub records: usize,
    /// Records folded into the state.
    pub applied: usize,
    /// Records skipped as corrupt or unrecognized.
    pub skipped: usize,
}

/// Append-only log of a shard's mutations.
///
/// Holds one open append handle for its lifetime. Appends are serialized by
/// an internal mutex and are durable (`fdatasync`) when they return.
pub struct WriteAheadLog {
    path: PathBuf,
    handle: Mutex<Option<Handle>>,
}

/// The open append handle.
struct Handle {
    file: File,
    /// Whether the file ends on a record boundary. Cleared while a line is
    /// being written, so a write that fails or is abandoned part-way makes
    /// the next append start on a fresh line.
    clean_tail: bool,
}

impl WriteAheadLog {
    /// Open the log at `path`, creating the parent directory and an empty
    /// file if needed. Existing history is preserved and appended to.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let existed = tokio::fs::try_exists(&path).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        if existed {
            info!(path = %path.display(), "using existing WAL file");
            // A crash mid-append can leave a partial last line. Terminate it so
            // the next record starts on a line of its own.
            if !ends_with_newline(&path).await? {
                warn!(path = %path.display(), "terminating torn WAL tail");
                file.write_all(b"\n").await?;
                file.flush().await?;
                file.sync_data().await?;
            }
        } else {
            info!(path = %path.display(), "created new WAL file");
        }

        Ok(Self {
            path,
            handle: Mutex::new(Some(Handle {
                file,
                clean_tail: true,
            })),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and sync it to storage.
    ///
    /// `value` is required for [`WalOp::Put`] and ignored for
    /// [`WalOp::Delete`]. Returns only after the record has been written
    /// and `sync_data` has completed.
    pub async fn append(&self, op: WalOp, key: &str, value: Option<&str>) -> Result<()> {
        let record = match op {
            WalOp::Put => {
                let value = value.ok_or_else(|| WalError::MissingValue {
                    key: key.to_string(),
                })?;
                WalRecord::put(key, value, unix_now())
            }
            WalOp::Delete => WalRecord::delete(key, unix_now()),
        };
        self.append_record(&record).await
    }

    /// Append a pre-built record and sync it to storage.
    pub async fn append_record(&self, record: &WalRecord) -> Result<()> {
        if record.op == WalOp::Put && record.value.is_none() {
            return Err(WalError::MissingValue {
                key: record.key.clone(),
            });
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut guard = self.handle.lock().await;
        let handle = guard.as_mut().ok_or(WalError::Closed)?;
        if !handle.clean_tail {
            warn!(path = %self.path.display(), "previous append incomplete, starting a new line");
            line.insert(0, b'\n');
        }
        handle.clean_tail = false;
        handle.file.write_all(&line).await?;
        handle.file.flush().await?;
        handle.file.sync_data().await?;
        handle.clean_tail = true;

        debug!(op = %record.op, key = %record.key, "wal append");
        Ok(())
    }

    /// Rebuild the key/value state by folding every record in append order.
    pub async fn replay(&self) -> Result<HashMap<String, String>> {
        let (state, _) = self.replay_with_report().await?;
        Ok(state)
    }

    /// Like [`replay`](Self::replay), also returning how many records were
    /// applied and skipped.
    pub async fn replay_with_report(&self) -> Result<(HashMap<String, String>, ReplayReport)> {
        replay_file(&self.path).await
    }

    /// Flush and release the file handle. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.handle.lock().await;
        if let Some(mut handle) = guard.take() {
            handle.file.flush().await?;
            handle.file.sync_all().await?;
            debug!(path = %self.path.display(), "WAL closed");
        }
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    pub async fn is_closed(&self) -> bool {
        self.handle.lock().await.is_none()
    }
}

/// Replay the log at `path` without opening it for writing.
///
/// Reads only: a torn tail is skipped but left in place. Used for offline
/// inspection of a data directory.
pub async fn replay_file(path: &Path) -> Result<(HashMap<String, String>, ReplayReport)> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut state = HashMap::new();
    let mut report = ReplayReport::default();
    let mut line = Vec::new();
    let mut line_number = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        line_number += 1;

        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        report.records += 1;

        match decode(trimmed) {
            Ok(Entry::Put { key, value }) => {
                state.insert(key, value);
                report.applied += 1;
            }
            Ok(Entry::Delete { key }) => {
                state.remove(&key);
                report.applied += 1;
            }
            Err(reason) => {
                warn!(path = %path.display(), line = line_number, %reason, "skipping WAL entry");
                report.skipped += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        keys = state.len(),
        records = report.records,
        skipped = report.skipped,
        "WAL replay complete"
    );
    Ok((state, report))
}

/// A record that passed validation.
enum Entry {
    Put { key: String, value: String },
    Delete { key: String },
}

/// Loose shape of a log line: every field optional so missing fields can be
/// reported individually instead of failing the whole parse.
#[derive(Deserialize)]
struct RawRecord {
    op: Option<String>,
    key: Option<String>,
    value: Option<String>,
}

fn decode(line: &[u8]) -> std::result::Result<Entry, String> {
    let raw: RawRecord =
        serde_json::from_slice(line).map_err(|e| format!("corrupted entry: {e}"))?;
    let op = raw.op.ok_or("missing field `op`")?;
    let key = raw.key.ok_or("missing field `key`")?;
    match op.as_str() {
        "PUT" => {
            let value = raw.value.ok_or("missing field `value`")?;
            Ok(Entry::Put { key, value })
        }
        "DELETE" => Ok(Entry::Delete { key }),
        other => Err(format!("unknown operation {other:?}")),
    }
}

/// Whether the file is empty or its last byte is `\n`.
async fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path).await?;
    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
