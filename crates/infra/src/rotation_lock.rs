//! Cross-process rotation lock using a PID file
//!
//! Only one process may re-encrypt stored data at a time. The lock file
//! lives beside the key directory; a file left behind by a dead process is
//! treated as stale and replaced.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use policyqa_domain::{PolicyQaError, Result};

const LOCK_FILE_NAME: &str = "rotation.pid";

/// Held for the duration of a rotation run; released on drop
#[derive(Debug)]
pub struct RotationLock {
    pid_file: PathBuf,
}

impl RotationLock {
    /// Lock file path for a key directory
    pub fn path_for(key_dir: &Path) -> PathBuf {
        match key_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(LOCK_FILE_NAME),
            _ => PathBuf::from(LOCK_FILE_NAME),
        }
    }

    /// Acquire the lock in `lock_dir`.
    ///
    /// Fails with `PolicyQaError::Security` while another live process holds it.
    pub fn acquire<P: AsRef<Path>>(lock_dir: P) -> Result<Self> {
        Self::acquire_file(lock_dir.as_ref().join(LOCK_FILE_NAME))
    }

    /// Acquire the lock that guards `key_dir`
    pub fn acquire_for_key_dir(key_dir: &Path) -> Result<Self> {
        Self::acquire_file(Self::path_for(key_dir))
    }

    fn acquire_file(pid_file: PathBuf) -> Result<Self> {
        if let Some(parent) = pid_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                PolicyQaError::Internal(format!("Failed to create lock directory: {e}"))
            })?;
        }

        if pid_file.exists() {
            if let Some(pid) = read_pid(&pid_file) {
                if is_process_running(pid) {
                    tracing::warn!(existing_pid = pid, "rotation_lock.held");
                    return Err(PolicyQaError::Security(format!(
                        "Key rotation already in progress (PID: {pid})"
                    )));
                }
                tracing::warn!(stale_pid = pid, "rotation_lock.stale_pid_file_detected");
            }
            if let Err(err) = fs::remove_file(&pid_file) {
                tracing::warn!(error = %err, path = %pid_file.display(), "rotation_lock.remove_stale_pid_failed");
            }
        }

        let current_pid = std::process::id();
        write_pid(&pid_file, current_pid).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => PolicyQaError::Security(
                "Key rotation already in progress (lock created concurrently)".to_string(),
            ),
            _ => PolicyQaError::Internal(format!("Failed to create rotation lock: {e}")),
        })?;

        tracing::info!(pid = current_pid, path = %pid_file.display(), "rotation_lock.acquired");
        Ok(Self { pid_file })
    }

    pub fn path(&self) -> &Path {
        &self.pid_file
    }
}

impl Drop for RotationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.pid_file) {
            tracing::warn!(error = %e, path = %self.pid_file.display(), "rotation_lock.remove_pid_failed");
        } else {
            tracing::debug!(path = %self.pid_file.display(), "rotation_lock.released");
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// `create_new` so two processes racing past the stale check cannot both win
fn write_pid(path: &Path, pid: u32) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(pid.to_string().as_bytes())
}

#[cfg(target_os = "linux")]
fn is_process_running(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_running(pid: u32) -> bool {
    use std::process::Command;

    // `kill -0` checks liveness without delivering a signal
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_process_running(pid: u32) -> bool {
    tracing::warn!(pid = pid, "rotation_lock.process_check_unsupported");
    false
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = TempDir::new().unwrap();

        let first = RotationLock::acquire(dir.path()).unwrap();
        let second = RotationLock::acquire(dir.path());
        assert!(matches!(second, Err(PolicyQaError::Security(_))));

        drop(first);
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
        assert!(RotationLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_stale_pid_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        // PIDs are bounded well below this on every supported platform
        fs::write(dir.path().join(LOCK_FILE_NAME), "4294967290").unwrap();

        let lock = RotationLock::acquire(dir.path()).unwrap();
        assert_eq!(read_pid(lock.path()), Some(std::process::id()));
    }

    #[test]
    fn test_lock_sits_beside_key_directory() {
        let path = RotationLock::path_for(Path::new("/var/lib/policyqa/keys"));
        assert_eq!(path, PathBuf::from("/var/lib/policyqa/rotation.pid"));
        assert_eq!(RotationLock::path_for(Path::new("keys")), PathBuf::from(LOCK_FILE_NAME));
    }
}
