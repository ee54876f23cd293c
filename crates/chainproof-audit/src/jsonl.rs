//! File-backed implementation of `AuditStore`.
//!
//! `JsonlAuditStore` keeps the chain in a JSON Lines file, one record per
//! line, in the same format the verifiers read.  Appends are serialized
//! twice over: an in-process `Mutex` orders threads, and an exclusive
//! advisory file lock (`fs2`) orders processes.  The on-disk tail is
//! re-read under both locks before each write, so a writer never extends a
//! tail it has not seen.
//!
//! A failed write is rolled back by truncating the file to its previous
//! length; the log never keeps a half-written record.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use tracing::{debug, warn};

use chainproof_contracts::{ChainproofError, ChainproofResult};
use chainproof_core::{AuditEvent, AuditStore, JsonlEvents, GENESIS_HASH};

/// What we last learned about the file's tail.
///
/// Valid only while the file is still `byte_len` bytes long; any other
/// length means another writer appended and the file is rescanned.
#[derive(Debug, Clone)]
struct TailCache {
    byte_len: u64,
    tail: String,
    count: usize,
}

/// An append-only audit log stored as a JSON Lines file.
pub struct JsonlAuditStore {
    path: PathBuf,
    cache: Mutex<Option<TailCache>>,
}

impl JsonlAuditStore {
    /// Open the log at `path`, creating it (and its parent directory) when
    /// missing.
    pub fn open(path: impl Into<PathBuf>) -> ChainproofResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;
        Ok(Self {
            path,
            cache: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A buffered reader over the raw log bytes, for streaming
    /// verification.
    pub fn reader(&self) -> ChainproofResult<BufReader<File>> {
        let file = File::open(&self.path).map_err(|e| io_error(&self.path, e))?;
        Ok(BufReader::new(file))
    }

    fn lock_cache(&self) -> ChainproofResult<MutexGuard<'_, Option<TailCache>>> {
        self.cache.lock().map_err(|e| ChainproofError::AuditWriteFailed {
            reason: format!("audit file lock poisoned: {}", e),
        })
    }

    /// Current tail, from the cache when the file has not grown since it
    /// was last scanned.
    fn current_tail(
        &self,
        file: &mut File,
        cache: &mut Option<TailCache>,
    ) -> ChainproofResult<TailCache> {
        let byte_len = file.metadata().map_err(|e| io_error(&self.path, e))?.len();
        if let Some(cached) = cache.as_ref() {
            if cached.byte_len == byte_len {
                return Ok(cached.clone());
            }
        }

        file.seek(SeekFrom::Start(0))
            .map_err(|e| io_error(&self.path, e))?;
        let mut tail = GENESIS_HASH.to_string();
        let mut count = 0;
        for event in JsonlEvents::new(BufReader::new(&*file)) {
            tail = event?.event_hash().to_string();
            count += 1;
        }
        let scanned = TailCache {
            byte_len,
            tail,
            count,
        };
        *cache = Some(scanned.clone());
        Ok(scanned)
    }

    /// Append under the file lock.  The caller releases the lock.
    fn append_locked(
        &self,
        file: &mut File,
        cache: &mut Option<TailCache>,
        event: &AuditEvent,
    ) -> ChainproofResult<()> {
        let current = self.current_tail(file, cache)?;
        if event.prev_hash() != current.tail {
            return Err(ChainproofError::StaleTailConflict {
                assumed: event.prev_hash().to_string(),
                actual: current.tail,
            });
        }

        let mut record = String::new();
        if current.byte_len > 0 && !ends_with_newline(file)? {
            record.push('\n');
        }
        record.push_str(&event.to_json_line()?);
        record.push('\n');

        let written = file
            .write_all(record.as_bytes())
            .and_then(|()| file.sync_data());
        if let Err(e) = written {
            *cache = None;
            self.roll_back(file, current.byte_len);
            return Err(ChainproofError::AuditWriteFailed {
                reason: format!("writing {}: {}", self.path.display(), e),
            });
        }

        *cache = Some(TailCache {
            byte_len: current.byte_len + record.len() as u64,
            tail: event.event_hash().to_string(),
            count: current.count + 1,
        });
        debug!(
            path = %self.path.display(),
            position = current.count,
            event_id = %event.event_id(),
            event_hash = %event.event_hash(),
            "audit record appended"
        );
        Ok(())
    }

    /// Truncate away whatever part of a failed record reached the file.
    fn roll_back(&self, file: &File, byte_len: u64) {
        if let Err(e) = file.set_len(byte_len) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to roll back partial audit record"
            );
        }
    }

    /// Run `f` with the file open and held under a shared lock.
    fn with_shared<T>(
        &self,
        f: impl FnOnce(&mut File, &mut Option<TailCache>) -> ChainproofResult<T>,
    ) -> ChainproofResult<T> {
        let mut cache = self.lock_cache()?;
        let mut file = File::open(&self.path).map_err(|e| io_error(&self.path, e))?;
        FileExt::lock_shared(&file).map_err(|e| io_error(&self.path, e))?;
        let result = f(&mut file, &mut *cache);
        let _ = FileExt::unlock(&file);
        result
    }
}

impl AuditStore for JsonlAuditStore {
    fn tail_hash(&self) -> ChainproofResult<String> {
        self.with_shared(|file, cache| Ok(self.current_tail(file, cache)?.tail))
    }

    fn compare_and_append(&self, event: &AuditEvent) -> ChainproofResult<()> {
        let mut cache = self.lock_cache()?;
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| ChainproofError::AuditWriteFailed {
            reason: format!("locking {}: {}", self.path.display(), e),
        })?;

        let result = self.append_locked(&mut file, &mut *cache, event);
        let _ = FileExt::unlock(&file);
        result
    }

    fn len(&self) -> ChainproofResult<usize> {
        self.with_shared(|file, cache| Ok(self.current_tail(file, cache)?.count))
    }

    fn snapshot(&self) -> ChainproofResult<Vec<AuditEvent>> {
        self.with_shared(|file, _| JsonlEvents::new(BufReader::new(&*file)).collect())
    }
}

fn ends_with_newline(file: &mut File) -> ChainproofResult<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn io_error(path: &Path, e: std::io::Error) -> ChainproofError {
    ChainproofError::Io {
        reason: format!("{}: {}", path.display(), e),
    }
}
