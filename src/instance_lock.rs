use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Exclusive per-host lock held for the lifetime of a `run` process.
///
/// Two processes reconciling against the same table would race each other's
/// classification reads and open duplicate visits, so the second one refuses to
/// start.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Lock `<runtime dir>/skylog/<name>.lock`
    pub fn acquire(name: &str) -> Result<Self> {
        Self::acquire_at(lock_path(name))
    }

    /// Lock an explicit path, creating parent directories as needed
    pub fn acquire_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lock directory {}", parent.display()))?;
        }

        // Not truncated on open: a running holder's PID must survive a failed attempt
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        try_lock_exclusive(&file).map_err(|e| {
            if e.kind() == io::ErrorKind::WouldBlock {
                anyhow::anyhow!(
                    "Another instance is already running (lock held at {})",
                    path.display()
                )
            } else {
                anyhow::Error::new(e).context("Failed to acquire instance lock")
            }
        })?;

        let pid = std::process::id();
        file.set_len(0).context("Failed to truncate lock file")?;
        writeln!(file, "{}", pid).context("Failed to write PID to lock file")?;

        info!("Acquired instance lock at {} (pid {})", path.display(), pid);
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_path(name: &str) -> PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    base.join("skylog").join(format!("{}.lock", name))
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // The file is never unlinked: every process must contend on the same inode
        if let Err(e) = self.file.set_len(0) {
            warn!("Failed to clear lock file {}: {}", self.path.display(), e);
        }
        unlock(&self.file);
        debug!("Released instance lock at {}", self.path.display());
    }
}
