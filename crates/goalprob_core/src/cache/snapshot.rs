//! Versioned JSON snapshots of the cache.
//!
//! Loading never fails the caller: a missing, unreadable or incompatible
//! snapshot just means starting with an empty cache.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{CacheEntry, CacheKey, SimulationCache};
use crate::error::CacheCorruption;
use crate::model::ProbabilityResult;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    saved_at: Timestamp,
    entries: Vec<EntryOut<'a>>,
}

#[derive(Serialize)]
struct EntryOut<'a> {
    key: &'a CacheKey,
    created_at: Timestamp,
    last_accessed: u64,
    ttl_seconds: u64,
    value: &'a ProbabilityResult,
}

#[derive(Deserialize)]
struct SnapshotIn {
    version: u32,
    #[serde(default)]
    entries: Vec<EntryIn>,
}

#[derive(Deserialize)]
struct EntryIn {
    key: CacheKey,
    created_at: Timestamp,
    #[serde(default)]
    last_accessed: u64,
    ttl_seconds: u64,
    value: ProbabilityResult,
}

impl SimulationCache {
    /// Write every live entry to `path`. The file is replaced atomically.
    pub fn save_snapshot(&self, path: &Path) -> io::Result<usize> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = temp_path(path);
        let count = self.write_snapshot(fs::File::create(&tmp_path)?)?;
        fs::rename(&tmp_path, path)?;

        tracing::debug!(path = %path.display(), entries = count, "Saved cache snapshot");
        Ok(count)
    }

    /// Serialize every live entry to `writer`. The entry lock is released
    /// before anything is written.
    pub fn write_snapshot<W: Write>(&self, writer: W) -> io::Result<usize> {
        let now = self.clock.now();
        let mut live: Vec<(CacheKey, Timestamp, u64, u64, Arc<ProbabilityResult>)> = self
            .read_entries()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| {
                (
                    entry.key.clone(),
                    entry.created_at,
                    entry.last_accessed_at(),
                    entry.ttl_seconds,
                    Arc::clone(&entry.value),
                )
            })
            .collect();
        live.sort_by(|a, b| a.0.cmp(&b.0));
        let count = live.len();

        let snapshot = SnapshotOut {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            entries: live
                .iter()
                .map(|(key, created_at, last_accessed, ttl_seconds, value)| EntryOut {
                    key,
                    created_at: *created_at,
                    last_accessed: *last_accessed,
                    ttl_seconds: *ttl_seconds,
                    value: value.as_ref(),
                })
                .collect(),
        };

        let mut writer = BufWriter::new(writer);
        serde_json::to_writer(&mut writer, &snapshot)?;
        writer.flush()?;
        Ok(count)
    }

    /// Merge entries from a snapshot file into this cache. Returns how many
    /// were loaded; problems are logged and yield 0.
    pub fn load_snapshot(&self, path: &Path) -> usize {
        match self.try_load_snapshot(path) {
            Ok(count) => {
                tracing::debug!(path = %path.display(), entries = count, "Loaded cache snapshot");
                count
            }
            Err(CacheCorruption::Io(err)) if err.kind() == io::ErrorKind::NotFound => 0,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Ignoring unreadable cache snapshot, starting empty"
                );
                0
            }
        }
    }

    /// Strict variant of [`load_snapshot`](Self::load_snapshot)
    pub fn try_load_snapshot(&self, path: &Path) -> Result<usize, CacheCorruption> {
        let content = fs::read_to_string(path)?;
        let snapshot: SnapshotIn = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheCorruption::VersionMismatch {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let now = self.clock.now();
        let mut incoming: Vec<EntryIn> = snapshot
            .entries
            .into_iter()
            .filter(|e| {
                let age = now.as_second().saturating_sub(e.created_at.as_second());
                age <= 0 || age as u64 <= e.ttl_seconds
            })
            .collect();
        // Most recently used first so the capacity cut keeps the hot entries
        incoming.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
        incoming.truncate(self.max_size);

        let max_tick = incoming.iter().map(|e| e.last_accessed).max().unwrap_or(0);
        self.tick.fetch_max(max_tick, Ordering::Relaxed);

        let mut entries = self.write_entries();
        let mut loaded = 0;
        for e in incoming.into_iter().rev() {
            if !entries.contains_key(&e.key) && entries.len() >= self.max_size {
                self.evict_lru(&mut entries);
            }
            entries.insert(
                e.key.clone(),
                CacheEntry {
                    key: e.key,
                    value: Arc::new(e.value),
                    created_at: e.created_at,
                    last_accessed: AtomicU64::new(e.last_accessed),
                    ttl_seconds: e.ttl_seconds,
                },
            );
            loaded += 1;
        }
        Ok(loaded)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache_snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Background thread writing a snapshot every `interval`, and once more
/// when stopped.
#[derive(Debug)]
pub struct PeriodicSnapshot {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicSnapshot {
    pub fn spawn(cache: Arc<SimulationCache>, path: PathBuf, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("goalprob-snapshot".to_string())
            .spawn(move || {
                loop {
                    let stop = match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => false,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                    };
                    if let Err(err) = cache.save_snapshot(&path) {
                        tracing::warn!(path = %path.display(), error = %err, "Cache snapshot failed");
                    }
                    if stop {
                        break;
                    }
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "Could not start snapshot thread");
                None
            }
        };

        Self {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Write a final snapshot and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PeriodicSnapshot {
    fn drop(&mut self) {
        self.shutdown();
    }
}
