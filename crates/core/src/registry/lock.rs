//! Advisory lock serializing registry writers.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::RegistryError;

/// Lock file next to the registry (`<registry>.lock`) holding the owner pid.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    /// Takes the lock or fails fast with [`RegistryError::Locked`].
    ///
    /// A lock left behind by a process that no longer exists is removed and
    /// taken over.
    pub fn acquire(registry_path: &Path) -> Result<Self, RegistryError> {
        let path = lock_path(registry_path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
        }

        let mut file = match create_lock_file(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = read_holder(&path);
                if !holder_is_stale(&holder) {
                    return Err(RegistryError::Locked { path, holder });
                }

                warn!(
                    lock = %path.display(),
                    holder = %holder,
                    "Reclaiming stale registry lock"
                );
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(RegistryError::io(&path, e)),
                }
                // Another run may reclaim it at the same time; only one create wins.
                match create_lock_file(&path) {
                    Ok(file) => file,
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        let holder = read_holder(&path);
                        return Err(RegistryError::Locked { path, holder });
                    }
                    Err(e) => return Err(RegistryError::io(&path, e)),
                }
            }
            Err(e) => return Err(RegistryError::io(&path, e)),
        };

        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            let _ = fs::remove_file(&path);
            return Err(RegistryError::io(&path, e));
        }

        debug!(lock = %path.display(), "Registry lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(lock = %self.path.display(), "Registry lock released"),
            Err(e) => warn!(lock = %self.path.display(), error = %e, "Failed to remove registry lock"),
        }
    }
}

fn create_lock_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn read_holder(path: &Path) -> String {
    let holder = fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if holder.is_empty() {
        "unknown".to_string()
    } else {
        holder
    }
}

/// True when the recorded pid is known not to be running.
///
/// Only decidable where `/proc` exists; elsewhere a lock is never stale.
fn holder_is_stale(holder: &str) -> bool {
    let Ok(pid) = holder.parse::<u32>() else {
        return false;
    };
    if pid == std::process::id() {
        return false;
    }
    let proc_root = Path::new("/proc");
    proc_root.join("self").exists() && !proc_root.join(pid.to_string()).exists()
}

/// `titles.toml` -> `titles.toml.lock`.
pub fn lock_path(registry_path: &Path) -> PathBuf {
    let mut name = registry_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "registry".into());
    name.push(".lock");
    registry_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/data/titles.toml")),
            PathBuf::from("/data/titles.toml.lock")
        );
    }

    #[test]
    fn test_second_acquire_fails_until_dropped() {
        let temp = TempDir::new().unwrap();
        let registry = temp.path().join("titles.toml");

        let lock = RegistryLock::acquire(&registry).unwrap();
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        let err = RegistryLock::acquire(&registry).unwrap_err();
        match err {
            RegistryError::Locked { holder, .. } => {
                assert_eq!(holder, std::process::id().to_string())
            }
            other => panic!("expected Locked, got {other:?}"),
        }

        drop(lock);
        assert!(!lock_path(&registry).exists());
        assert!(RegistryLock::acquire(&registry).is_ok());
    }

    #[test]
    fn test_lock_of_unknown_holder_is_kept() {
        let temp = TempDir::new().unwrap();
        let registry = temp.path().join("titles.toml");
        fs::write(lock_path(&registry), "").unwrap();

        match RegistryLock::acquire(&registry).unwrap_err() {
            RegistryError::Locked { path, holder } => {
                assert_eq!(path, lock_path(&registry));
                assert_eq!(holder, "unknown");
            }
            other => panic!("expected Locked, got {other:?}"),
        }
        assert!(lock_path(&registry).exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_lock_of_dead_process_is_reclaimed() {
        let temp = TempDir::new().unwrap();
        let registry = temp.path().join("titles.toml");
        // Above the kernel's pid_max, so never a live process.
        fs::write(lock_path(&registry), "4294967\n").unwrap();

        let lock = RegistryLock::acquire(&registry).unwrap();
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_acquire_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let registry = temp.path().join("nested/dir/titles.toml");
        let lock = RegistryLock::acquire(&registry).unwrap();
        assert!(lock.path().exists());
    }
}
