//! Advisory per-change-request locks.
//!
//! At most one review cycle may run per change request. The registry always
//! guards against concurrent cycles in this process; with a lock directory
//! configured it also takes an exclusive OS file lock on `<dir>/<id>.lock`
//! so separate processes exclude each other. The OS lock lives as long as
//! the guard's file handle, so a killed process never leaves a lock behind.
//! Acquisition never waits: a held lock fails fast with
//! [`GateError::LockHeld`].

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use fs2::FileExt;
use reviewgate_state::encode_key;
use tracing::debug;

use crate::domain::{ChangeRequestId, GateError, GateResult};

#[derive(Debug, Default)]
pub struct LockRegistry {
    held: Arc<Mutex<HashSet<String>>>,
    lock_dir: Option<PathBuf>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also lock a file under `dir` for every acquisition.
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            held: Arc::default(),
            lock_dir: Some(dir.into()),
        }
    }

    pub fn lock_path(&self, id: &ChangeRequestId) -> Option<PathBuf> {
        self.lock_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.lock", encode_key(id.as_str()))))
    }

    pub fn is_held(&self, id: &ChangeRequestId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(id.as_str()))
            .unwrap_or(true)
    }

    /// Take the lock for `id` or fail immediately.
    pub fn try_acquire(&self, id: &ChangeRequestId) -> GateResult<CycleLock> {
        let key = id.to_string();
        let lock_held = || GateError::LockHeld {
            change_request: key.clone(),
        };
        {
            let mut held = self
                .held
                .lock()
                .map_err(|_| GateError::Config("lock registry poisoned".into()))?;
            if !held.insert(key.clone()) {
                return Err(lock_held());
            }
        }

        let file = match self.lock_path(id) {
            Some(path) => match lock_file(&path) {
                Ok(Some(file)) => Some(file),
                outcome => {
                    if let Ok(mut held) = self.held.lock() {
                        held.remove(&key);
                    }
                    return Err(match outcome {
                        Err(err) => GateError::Io(err),
                        _ => lock_held(),
                    });
                }
            },
            None => None,
        };
        debug!(change_request = %key, "cycle lock acquired");
        Ok(CycleLock {
            key,
            held: Arc::clone(&self.held),
            _file: file,
        })
    }
}

/// Open `path` and try an exclusive lock on it. `Ok(None)` means another
/// handle holds it.
fn lock_file(path: &Path) -> std::io::Result<Option<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    if let Err(err) = file.try_lock_exclusive() {
        let contended = err.kind() == ErrorKind::WouldBlock
            || err.raw_os_error() == fs2::lock_contended_error().raw_os_error();
        return if contended { Ok(None) } else { Err(err) };
    }
    // Holder info for operators; the lock itself is the OS lock.
    file.set_len(0)?;
    writeln!(file, "pid={} acquired_at={}", std::process::id(), Utc::now().to_rfc3339())?;
    Ok(Some(file))
}

/// RAII guard; dropping it releases the lock.
#[derive(Debug)]
pub struct CycleLock {
    key: String,
    held: Arc<Mutex<HashSet<String>>>,
    /// Closing the handle releases the OS lock. The file itself stays.
    _file: Option<File>,
}

impl CycleLock {
    pub fn change_request(&self) -> &str {
        &self.key
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.key);
        }
        debug!(change_request = %self.key, "cycle lock released");
    }
}
