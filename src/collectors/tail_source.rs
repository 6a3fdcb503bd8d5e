//! Asynchronous file tailer
//!
//! One `TailSource` owns the handle to one watched file and produces a
//! gap-free, duplicate-free stream of complete lines over a channel.
//! Watching begins at the current end of file (historical content is not
//! replayed). Rotation is detected by a file identity change, truncation by
//! the file shrinking below the last observed offset; both cause a reopen
//! that resumes from the new file's start. Partial lines are buffered until
//! their newline arrives and are discarded at shutdown, so a line is never
//! emitted twice.

use crate::error::TailError;
use crate::events::{RawLine, SourceId};
use crate::health::HealthRegistry;
use chrono::Utc;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::{mpsc, watch};

/// Reopen attempts before a source is marked degraded
pub const MAX_REOPEN_ATTEMPTS: u32 = 5;

/// Retry cadence once a source is degraded
const DEGRADED_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Identity of an open file, used to detect rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

/// Where to position the handle after a (re)open
#[derive(Debug, Clone, Copy)]
enum ResumeFrom {
    /// Initial open: tail from the current end, no historical replay
    End,
    /// The path holds new content (rotation/truncation): read from the top
    Start,
    /// Same file as before: pick up at the remembered offset, clamped to
    /// the current length; a changed identity falls back to the top
    Offset(FileId, u64),
}

fn file_id(metadata: &std::fs::Metadata) -> FileId {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        FileId {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        FileId { dev: 0, ino: 0 }
    }
}

/// Tails one file and emits complete lines
pub struct TailSource {
    source_id: SourceId,
    path: PathBuf,
    poll_interval: Duration,
    output: mpsc::Sender<RawLine>,
    health: Arc<HealthRegistry>,
    shutdown: watch::Receiver<bool>,
    /// Next per-source sequence number
    seq: u64,
    /// Bytes of an incomplete trailing line
    pending: Vec<u8>,
}

impl TailSource {
    pub fn new(
        source_id: SourceId,
        path: impl Into<PathBuf>,
        poll_interval: Duration,
        output: mpsc::Sender<RawLine>,
        health: Arc<HealthRegistry>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source_id,
            path: path.into(),
            poll_interval,
            output,
            health,
            shutdown,
            seq: 0,
            pending: Vec::new(),
        }
    }

    /// Open the watched file, creating it if it does not exist yet
    ///
    /// Returns the handle together with its identity and current length.
    async fn open(&self) -> Result<(File, FileId, u64), TailError> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "{} does not exist yet, creating empty file",
                    self.path.display()
                );
                File::create(&self.path)
                    .await
                    .map_err(|e| TailError::Open {
                        path: self.path.display().to_string(),
                        source: e,
                    })?;
                File::open(&self.path).await.map_err(|e| TailError::Open {
                    path: self.path.display().to_string(),
                    source: e,
                })?
            }
            Err(e) => {
                return Err(TailError::Open {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        let metadata = file.metadata().await?;
        Ok((file, file_id(&metadata), metadata.len()))
    }

    /// Run the tail loop until shutdown
    ///
    /// The first open starts at end-of-file; reopens after rotation or
    /// truncation start at offset zero, while a reopen after a transient
    /// read error resumes at the old offset so already-emitted lines are
    /// never re-read. Open failures are retried with the health registry
    /// tracking the attempts.
    pub async fn run(mut self) {
        let (mut file, mut id, mut offset) = match self.reopen_with_retry(ResumeFrom::End).await {
            Some(state) => state,
            None => return,
        };
        self.health.record_read(self.source_id, Utc::now());
        info!(
            "Tailing {} from offset {}",
            self.path.display(),
            offset
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if !self.pending.is_empty() {
                        debug!(
                            "Discarding {} buffered bytes of a partial line from {}",
                            self.pending.len(),
                            self.path.display()
                        );
                    }
                    break;
                }
                _ = interval.tick() => {}
            }

            // Rotation/truncation check against the path, not the handle: a
            // rotated file keeps the old handle alive but the path points at
            // a new inode.
            match tokio::fs::metadata(&self.path).await {
                Ok(metadata) => {
                    let current_id = file_id(&metadata);
                    if current_id != id {
                        info!("{} rotated, reopening", self.path.display());
                        // Data appended to the old file since the last poll
                        // is accepted loss.
                        self.pending.clear();
                        match self.reopen_with_retry(ResumeFrom::Start).await {
                            Some((new_file, new_id, new_offset)) => {
                                file = new_file;
                                id = new_id;
                                offset = new_offset;
                            }
                            None => break,
                        }
                        continue;
                    }
                    if metadata.len() < offset {
                        info!("{} truncated, resuming from start", self.path.display());
                        self.pending.clear();
                        offset = 0;
                        if file.seek(SeekFrom::Start(0)).await.is_err() {
                            match self.reopen_with_retry(ResumeFrom::Start).await {
                                Some((new_file, new_id, _)) => {
                                    file = new_file;
                                    id = new_id;
                                }
                                None => break,
                            }
                        }
                    }
                }
                Err(_) => {
                    // Path briefly missing mid-rotation; keep the old handle
                    // and check again next tick.
                    continue;
                }
            }

            match self.read_appended(&mut file).await {
                Ok(0) => {}
                Ok(n) => {
                    offset += n as u64;
                    self.health.record_read(self.source_id, Utc::now());
                    if !self.emit_complete_lines().await {
                        return; // receiver dropped
                    }
                }
                Err(e) => {
                    warn!("Read error on {}: {}", self.path.display(), e);
                    // The file itself is usually fine; resume at the old
                    // offset so nothing already emitted is read again.
                    match self.reopen_with_retry(ResumeFrom::Offset(id, offset)).await {
                        Some((new_file, new_id, new_offset)) => {
                            if new_id != id {
                                self.pending.clear();
                            }
                            file = new_file;
                            id = new_id;
                            offset = new_offset;
                        }
                        None => break,
                    }
                }
            }
        }

        info!("Tail source for {} stopped", self.path.display());
    }

    /// Read whatever has been appended since the last poll into the pending
    /// buffer, returning the number of bytes consumed
    async fn read_appended(&mut self, file: &mut File) -> Result<usize, std::io::Error> {
        let mut total = 0;
        let mut buf = [0u8; 4096];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n;
            self.pending.extend_from_slice(&buf[..n]);
        }
        Ok(total)
    }

    /// Emit every newline-terminated line in the pending buffer
    ///
    /// Only complete lines are decoded, so a multi-byte character split
    /// across read chunks is never corrupted. Returns false when the
    /// receiving side is gone.
    async fn emit_complete_lines(&mut self) -> bool {
        while let Some(newline_pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut bytes: Vec<u8> = self.pending.drain(..=newline_pos).collect();
            bytes.pop(); // strip the newline
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            let text = String::from_utf8_lossy(&bytes).into_owned();

            let line = RawLine {
                source_id: self.source_id,
                seq: self.seq,
                text,
                observed_at: Utc::now(),
            };
            self.seq += 1;

            if self.output.send(line).await.is_err() {
                debug!("Line channel closed, stopping {}", self.path.display());
                return false;
            }
        }
        true
    }

    /// Reopen the file, retrying with the health registry tracking failures
    ///
    /// The handle is positioned per `resume` before being handed back; a
    /// failed seek is retried exactly like a failed open, so a caller never
    /// receives a handle at the wrong position. Once `MAX_REOPEN_ATTEMPTS`
    /// consecutive attempts fail the source is marked degraded and retried
    /// on a slow cadence rather than giving up; other sources keep running
    /// either way. Returns None only when shut down mid-retry.
    async fn reopen_with_retry(&mut self, resume: ResumeFrom) -> Option<(File, FileId, u64)> {
        loop {
            let error = match self.open().await {
                Ok((mut file, id, len)) => {
                    let offset = match resume {
                        ResumeFrom::End => len,
                        ResumeFrom::Start => 0,
                        ResumeFrom::Offset(prev_id, prev_offset) if prev_id == id => {
                            prev_offset.min(len)
                        }
                        ResumeFrom::Offset(..) => 0,
                    };
                    match file.seek(SeekFrom::Start(offset)).await {
                        Ok(_) => return Some((file, id, offset)),
                        Err(e) => TailError::IoError(e),
                    }
                }
                Err(e) => e,
            };

            warn!("Failed to reopen {}: {}", self.path.display(), error);
            self.health
                .record_reopen_failure(self.source_id, MAX_REOPEN_ATTEMPTS);

            let degraded = self
                .health
                .snapshot()
                .get(self.source_id)
                .map(|s| s.state == crate::health::SourceState::Degraded)
                .unwrap_or(false);
            let delay = if degraded {
                DEGRADED_RETRY_INTERVAL
            } else {
                self.poll_interval
            };

            tokio::select! {
                _ = self.shutdown.changed() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
