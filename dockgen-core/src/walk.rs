//! Bounded, cycle-safe directory traversal.
//!
//! Project trees handed to the generator are untrusted: they may contain
//! symlink rings, absurd nesting, or huge fan-out. Four guards together
//! guarantee termination: a canonicalized visited set (cycles), a depth
//! bound, a file-count bound, and a conservative symlink policy. Bound
//! hits end the walk quietly with a partial result; they are not errors.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

/// Immutable limits for one traversal.
#[derive(Debug, Clone, Copy)]
pub struct TraversalBudget {
    /// Directories at this depth are not descended into (root is depth 0).
    pub max_depth: usize,
    /// The walk stops outright once this many files have been collected.
    pub max_files: usize,
    /// When false, symlinks are never followed; files behind them are
    /// invisible to the walk.
    pub follow_symlinks: bool,
}

impl Default for TraversalBudget {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_files: 10_000,
            follow_symlinks: false,
        }
    }
}

/// Enumerates files under `root` depth-first within `budget`.
///
/// Uses an explicit work stack carrying each directory's depth rather
/// than recursion, so the bounds hold independent of call-stack limits.
/// Unreadable entries are skipped individually, never failing the walk.
pub async fn walk(root: &Path, budget: &TraversalBudget) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    // With symlinks followed, one physical file can be reachable under
    // several names; collected files are keyed on canonical identity so
    // each counts once against the budget.
    let mut seen_files: HashSet<PathBuf> = HashSet::new();
    let mut stack: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];

    'dirs: while let Some((dir, depth)) = stack.pop() {
        if files.len() >= budget.max_files {
            break;
        }

        // Cycle guard: key on the symlink-resolved identity of the
        // directory, so a link back to an ancestor stops this branch.
        let real = match fs::canonicalize(&dir).await {
            Ok(real) => real,
            Err(error) => {
                debug!(?error, dir = %dir.display(), "skipping unreadable directory");
                continue;
            }
        };
        if !visited.insert(real) {
            debug!(dir = %dir.display(), "already visited; skipping cycle");
            continue;
        }

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(?error, dir = %dir.display(), "cannot enumerate directory");
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => {
                    warn!(?error, dir = %dir.display(), "directory enumeration aborted");
                    break;
                }
            };
            if files.len() >= budget.max_files {
                break 'dirs;
            }

            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(error) => {
                    debug!(?error, path = %path.display(), "skipping entry with unreadable type");
                    continue;
                }
            };

            if file_type.is_symlink() {
                if !budget.follow_symlinks {
                    continue;
                }
                match fs::metadata(&path).await {
                    Ok(meta) if meta.is_dir() => {
                        if depth < budget.max_depth {
                            stack.push((path, depth + 1));
                        }
                    }
                    Ok(meta) if meta.is_file() => match fs::canonicalize(&path).await {
                        Ok(real) => {
                            if seen_files.insert(real) {
                                files.push(path);
                            }
                        }
                        Err(error) => {
                            debug!(?error, path = %path.display(), "skipping unresolvable symlink");
                        }
                    },
                    Ok(_) => {}
                    Err(error) => {
                        // Broken link: skip the entry, keep walking.
                        debug!(?error, path = %path.display(), "skipping broken symlink");
                    }
                }
            } else if file_type.is_dir() {
                if depth < budget.max_depth {
                    stack.push((path, depth + 1));
                }
            } else if file_type.is_file() {
                if budget.follow_symlinks {
                    match fs::canonicalize(&path).await {
                        Ok(real) => {
                            if seen_files.insert(real) {
                                files.push(path);
                            }
                        }
                        Err(error) => {
                            debug!(?error, path = %path.display(), "skipping unresolvable file");
                        }
                    }
                } else {
                    files.push(path);
                }
            }
        }
    }

    files.truncate(budget.max_files);
    files
}
