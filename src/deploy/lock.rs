// ABOUTME: Deploy lock to prevent concurrent deployments to the same service.
// ABOUTME: Lock info is stored as JSON and linked into place atomically, never half-written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::types::ServiceIdentity;

use super::error::{LockError, LockHolderInfo};

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    pub cluster: String,
    /// Service being deployed.
    pub service: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(service: &ServiceIdentity) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            cluster: service.cluster().to_string(),
            service: service.service().to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file for a service inside `dir`.
    pub fn lock_path(dir: &Path, service: &ServiceIdentity) -> PathBuf {
        dir.join(format!("{}.{}.lock", service.cluster(), service.service()))
    }

    fn holder_info(&self) -> LockHolderInfo {
        LockHolderInfo {
            holder: self.holder.clone(),
            pid: self.pid,
            started_at: self.started_at,
        }
    }
}

/// An unparsable lock file younger than this may still be mid-write.
const UNREADABLE_GRACE: Duration = Duration::from_secs(60);

/// A breaker file older than this was left behind by a crashed process.
const BREAKER_STALE: Duration = Duration::from_secs(60);

/// A held deploy lock. Released explicitly, or on drop as a fallback.
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    released: bool,
}

impl DeployLock {
    /// Acquire the deploy lock for `service`.
    ///
    /// The lock file is written in full to a temporary file and then linked
    /// into place without clobbering, so it never appears half-written and
    /// two processes cannot both win. Stale (>1 hour) locks are broken with a
    /// warning; a live lock is only broken with `force`. Breaking happens
    /// under a separate breaker file and only retires the exact lock that was
    /// judged breakable.
    pub fn acquire(dir: &Path, service: &ServiceIdentity, force: bool) -> Result<Self, LockError> {
        fs::create_dir_all(dir).map_err(|e| LockError::io(dir, e))?;

        let path = LockInfo::lock_path(dir, service);
        let contents = serde_json::to_vec(&LockInfo::new(service))?;

        if publish(dir, &path, &contents)? {
            return Ok(Self::held(path));
        }

        let observed = Observed::read(&path)?;
        observed.ensure_breakable(&path, force)?;

        let _breaker = Breaker::acquire(&path)?;
        if Observed::read(&path)?.raw() != observed.raw() {
            return Err(LockError::Contended(path));
        }
        if let Some(raw) = observed.raw() {
            retire(&path, raw)?;
        }

        if publish(dir, &path, &contents)? {
            Ok(Self::held(path))
        } else {
            Err(LockError::Contended(path))
        }
    }

    fn held(path: PathBuf) -> Self {
        tracing::debug!(path = %path.display(), "deploy lock acquired");
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io(&self.path, e)),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Link a fully written lock file into place. `false` if one already exists.
fn publish(dir: &Path, path: &Path, contents: &[u8]) -> Result<bool, LockError> {
    let mut staged = tempfile::Builder::new()
        .prefix(".rollsafe-lock")
        .tempfile_in(dir)
        .map_err(|e| LockError::io(dir, e))?;
    staged
        .write_all(contents)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| LockError::io(staged.path(), e))?;

    match staged.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(LockError::io(path, e.error)),
    }
}

/// Move the lock aside and delete it, provided it still holds `expected`.
///
/// Callers hold the breaker, so the only way the file can differ is its
/// holder releasing and a new holder publishing in between. That lock is
/// put back.
fn retire(path: &Path, expected: &[u8]) -> Result<(), LockError> {
    let retired = path.with_extension(format!("lock.broken-{}", std::process::id()));
    match fs::rename(path, &retired) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(LockError::io(path, e)),
    }

    let moved = fs::read(&retired).map_err(|e| LockError::io(&retired, e))?;
    if moved != expected {
        if let Err(e) = fs::hard_link(&retired, path) {
            tracing::warn!(path = %path.display(), error = %e, "could not restore a lock taken while breaking");
        }
        let _ = fs::remove_file(&retired);
        return Err(LockError::Contended(path.to_path_buf()));
    }

    tracing::debug!(path = %path.display(), "removed broken lock");
    fs::remove_file(&retired).map_err(|e| LockError::io(&retired, e))
}

/// What sits at the lock path when publishing failed.
#[derive(Debug)]
enum Observed {
    /// Released in the meantime.
    Missing,
    Valid { info: LockInfo, raw: Vec<u8> },
    Unreadable { raw: Vec<u8>, age: Duration },
}

impl Observed {
    fn read(path: &Path) -> Result<Self, LockError> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Observed::Missing),
            Err(e) => return Err(LockError::io(path, e)),
        };
        match serde_json::from_slice(&raw) {
            Ok(info) => Ok(Observed::Valid { info, raw }),
            Err(_) => Ok(Observed::Unreadable {
                raw,
                age: file_age(path)?,
            }),
        }
    }

    fn raw(&self) -> Option<&[u8]> {
        match self {
            Observed::Missing => None,
            Observed::Valid { raw, .. } | Observed::Unreadable { raw, .. } => Some(raw),
        }
    }

    /// `Ok` when this lock may be broken; the reason is logged.
    fn ensure_breakable(&self, path: &Path, force: bool) -> Result<(), LockError> {
        match self {
            Observed::Missing => Ok(()),
            Observed::Valid { info, .. } if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    info.holder,
                    info.pid,
                    info.started_at
                );
                Ok(())
            }
            Observed::Valid { info, .. } if info.is_stale() => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    info.holder,
                    info.pid,
                    info.started_at
                );
                Ok(())
            }
            Observed::Valid { info, .. } => Err(LockError::Held {
                path: path.to_path_buf(),
                info: info.holder_info(),
            }),
            Observed::Unreadable { age, .. } if force || *age >= UNREADABLE_GRACE => {
                tracing::warn!(age = ?age, "Lock info corrupted, breaking lock");
                Ok(())
            }
            Observed::Unreadable { .. } => Err(LockError::Unreadable(path.to_path_buf())),
        }
    }
}

/// Serializes processes breaking the same lock. Removed on drop.
#[derive(Debug)]
struct Breaker {
    path: PathBuf,
}

impl Breaker {
    fn acquire(lock_path: &Path) -> Result<Self, LockError> {
        let path = lock_path.with_extension("lock.break");

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if file_age(&path)? < BREAKER_STALE {
                        break;
                    }
                    tracing::warn!(path = %path.display(), "removing abandoned lock breaker");
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(LockError::io(&path, e)),
                    }
                }
                Err(e) => return Err(LockError::io(&path, e)),
            }
        }

        Err(LockError::Contended(lock_path.to_path_buf()))
    }
}

impl Drop for Breaker {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Time since the file was last written. A file that just vanished counts as new.
fn file_age(path: &Path) -> Result<Duration, LockError> {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Duration::ZERO),
        Err(e) => return Err(LockError::io(path, e)),
    };
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}
