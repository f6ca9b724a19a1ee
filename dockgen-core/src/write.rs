//! Atomic, verified file replacement with backup and rollback.
//!
//! Destination files may already exist and must never be observable in a
//! half-written state. Protocol per write: serialize on the destination
//! path, back up any existing file, stage the new content in a `*.tmp`
//! sibling, read it back and byte-compare, and only then replace the
//! destination. The destructive step happens strictly after
//! verification, so a storage fault mid-write leaves the original
//! untouched. Neither `*.tmp` nor `*.backup` survives a write, whichever
//! way it ends.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::fs;
use tracing::warn;

use crate::lock::KeyedMutex;

pub struct AtomicFileWriter {
    locks: KeyedMutex<PathBuf>,
    #[cfg(test)]
    corrupt_staged: std::sync::atomic::AtomicBool,
}

impl Default for AtomicFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicFileWriter {
    pub fn new() -> Self {
        Self {
            locks: KeyedMutex::new(),
            #[cfg(test)]
            corrupt_staged: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Writes `content` to `path`, replacing any existing file atomically.
    ///
    /// Returns `true` on success. Every failure mode is caught and
    /// logged; on failure the pre-existing file (if any) is intact and
    /// no staging residue remains.
    pub async fn write_atomic(&self, path: &Path, content: &str) -> bool {
        // Per-path serialization: two writers aiming at the same
        // destination apply in lock-acquisition order, never interleaved.
        let _guard = self.locks.lock(path.to_path_buf()).await;
        match self.replace(path, content.as_bytes()).await {
            Ok(()) => true,
            Err(error) => {
                warn!(?error, path = %path.display(), "atomic write failed; destination unchanged");
                false
            }
        }
    }

    async fn replace(&self, path: &Path, content: &[u8]) -> Result<()> {
        let tmp = sibling(path, "tmp");
        let backup = sibling(path, "backup");
        let had_original = fs::try_exists(path)
            .await
            .with_context(|| format!("checking for existing {}", path.display()))?;

        let staged = self
            .stage(path, &tmp, &backup, content, had_original)
            .await;
        if staged.is_err() {
            clean_residue(path, &tmp, &backup, had_original).await;
        }
        staged
    }

    async fn stage(
        &self,
        path: &Path,
        tmp: &Path,
        backup: &Path,
        content: &[u8],
        had_original: bool,
    ) -> Result<()> {
        if had_original {
            fs::copy(path, backup)
                .await
                .with_context(|| format!("backing up {}", path.display()))?;
        }

        fs::write(tmp, content)
            .await
            .with_context(|| format!("staging {}", tmp.display()))?;

        #[cfg(test)]
        if self.corrupt_staged.load(std::sync::atomic::Ordering::SeqCst) {
            fs::write(tmp, b"corrupted by test hook").await?;
        }

        // Read-back verification: a truncated or bit-flipped staging
        // write must be caught before anything touches the destination.
        let staged = fs::read(tmp)
            .await
            .with_context(|| format!("verifying {}", tmp.display()))?;
        if staged != content {
            bail!(
                "verification mismatch for {}: staged {} bytes, expected {}",
                path.display(),
                staged.len(),
                content.len()
            );
        }

        if had_original {
            fs::remove_file(path)
                .await
                .with_context(|| format!("removing old {}", path.display()))?;
        }
        if let Err(error) = fs::rename(tmp, path).await {
            if had_original {
                if let Err(restore) = fs::rename(backup, path).await {
                    warn!(?restore, path = %path.display(), "rollback from backup failed");
                }
            }
            return Err(error).with_context(|| format!("publishing {}", path.display()));
        }

        if had_original {
            if let Err(error) = fs::remove_file(backup).await {
                // The write itself succeeded; only the backup lingers.
                warn!(?error, backup = %backup.display(), "could not remove backup");
            }
        }
        Ok(())
    }
}

/// Removes staging residue after a failed write.
///
/// The backup is only deleted while the destination still holds the
/// original. If the destination vanished (the replace step failed after
/// removing it and the rollback also failed), the backup is the sole
/// surviving copy of the original content and must outlive the cleanup.
async fn clean_residue(path: &Path, tmp: &Path, backup: &Path, had_original: bool) {
    let _ = fs::remove_file(tmp).await;
    if !had_original {
        return;
    }
    match fs::try_exists(path).await {
        Ok(true) => {
            let _ = fs::remove_file(backup).await;
        }
        _ => {
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                "destination missing after failed write; keeping backup"
            );
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn residue(dir: &Path) -> Vec<String> {
        std_fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp") || n.ends_with(".backup"))
            .collect()
    }

    #[tokio::test]
    async fn creates_a_new_file() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("Dockerfile");
        let writer = AtomicFileWriter::new();

        assert!(writer.write_atomic(&dest, "FROM scratch\n").await);
        assert_eq!(std_fs::read_to_string(&dest).unwrap(), "FROM scratch\n");
        assert!(residue(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn replaces_an_existing_file() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("compose.yml");
        std_fs::write(&dest, "old").unwrap();
        let writer = AtomicFileWriter::new();

        assert!(writer.write_atomic(&dest, "new").await);
        assert_eq!(std_fs::read_to_string(&dest).unwrap(), "new");
        assert!(residue(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn verification_failure_leaves_original_intact() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("Dockerfile");
        std_fs::write(&dest, "original").unwrap();

        let writer = AtomicFileWriter::new();
        writer.corrupt_staged.store(true, Ordering::SeqCst);

        assert!(!writer.write_atomic(&dest, "replacement").await);
        assert_eq!(std_fs::read_to_string(&dest).unwrap(), "original");
        assert!(residue(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn verification_failure_on_fresh_file_leaves_nothing() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("Dockerfile");

        let writer = AtomicFileWriter::new();
        writer.corrupt_staged.store(true, Ordering::SeqCst);

        assert!(!writer.write_atomic(&dest, "content").await);
        assert!(!dest.exists());
        assert!(residue(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn cleanup_drops_backup_only_while_original_is_intact() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("Dockerfile");
        let tmp = sibling(&dest, "tmp");
        let backup = sibling(&dest, "backup");

        // Destination still holds the original: backup is redundant.
        std_fs::write(&dest, "original").unwrap();
        std_fs::write(&tmp, "staged").unwrap();
        std_fs::write(&backup, "original").unwrap();
        clean_residue(&dest, &tmp, &backup, true).await;
        assert!(!tmp.exists());
        assert!(!backup.exists());
        assert_eq!(std_fs::read_to_string(&dest).unwrap(), "original");
    }

    #[tokio::test]
    async fn cleanup_keeps_backup_when_destination_vanished() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("Dockerfile");
        let tmp = sibling(&dest, "tmp");
        let backup = sibling(&dest, "backup");

        // Replace failed after removing the destination and rollback did
        // not restore it: the backup is the only copy left.
        std_fs::write(&tmp, "staged").unwrap();
        std_fs::write(&backup, "original").unwrap();
        clean_residue(&dest, &tmp, &backup, true).await;
        assert!(!tmp.exists());
        assert_eq!(std_fs::read_to_string(&backup).unwrap(), "original");
    }

    #[tokio::test]
    async fn concurrent_writes_yield_one_of_the_inputs() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("Dockerfile");
        let writer = Arc::new(AtomicFileWriter::new());

        let a = {
            let writer = writer.clone();
            let dest = dest.clone();
            tokio::spawn(async move { writer.write_atomic(&dest, "AAAA").await })
        };
        let b = {
            let writer = writer.clone();
            let dest = dest.clone();
            tokio::spawn(async move { writer.write_atomic(&dest, "BBBB").await })
        };

        assert!(a.await.unwrap());
        assert!(b.await.unwrap());

        let final_content = std_fs::read_to_string(&dest).unwrap();
        assert!(
            final_content == "AAAA" || final_content == "BBBB",
            "got interleaved content: {final_content}"
        );
        assert!(residue(temp.path()).is_empty());
        assert!(!writer.locks.is_locked(&dest));
    }

    #[tokio::test]
    async fn write_to_missing_parent_fails_cleanly() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("no/such/dir/Dockerfile");
        let writer = AtomicFileWriter::new();

        assert!(!writer.write_atomic(&dest, "content").await);
        assert!(residue(temp.path()).is_empty());
    }
}
