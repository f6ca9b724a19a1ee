//! Workspace root selection and validation.
//!
//! Multiple project roots can be open at once (multi-root editors, or
//! several directories passed on the command line); exactly one must be
//! chosen per generation, fresh each time - roots are never cached
//! across invocations because they can disappear from under us.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// A validated root: absolute, existing, and a directory at the time of
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    pub name: String,
    pub path: PathBuf,
}

/// An unvalidated candidate presented to the operator: `name` is the
/// menu label, `path` the detail line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceCandidate {
    pub name: String,
    pub path: PathBuf,
}

impl WorkspaceCandidate {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            name,
            path: path.to_path_buf(),
        }
    }
}

/// The three distinct failure reports of resolution. `Cancelled` (the
/// operator dismissed the menu) must never be conflated with
/// `InvalidRoot` (the chosen directory cannot be used).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no workspace open; nothing to generate into")]
    NoWorkspace,
    #[error("workspace selection cancelled")]
    Cancelled,
    #[error("cannot access workspace root {path}: {reason}")]
    InvalidRoot { path: String, reason: String },
}

/// Operator-facing disambiguation seam. The CLI backs this with a stdin
/// prompt; tests use scripted pickers.
#[async_trait]
pub trait WorkspacePicker: Send + Sync {
    /// Returns the index of the chosen candidate, or `None` if the
    /// operator cancelled.
    async fn pick(&self, candidates: &[WorkspaceCandidate]) -> Option<usize>;
}

/// Picks the single active root among `candidates`.
///
/// Zero candidates is fatal for the caller; one is validated directly;
/// several go through `picker`. Whatever comes back is re-validated,
/// since a stale candidate may have been deleted since it was listed.
pub async fn resolve(
    candidates: &[WorkspaceCandidate],
    picker: &dyn WorkspacePicker,
) -> Result<WorkspaceRoot, ResolveError> {
    match candidates {
        [] => {
            warn!("no workspace open");
            Err(ResolveError::NoWorkspace)
        }
        [only] => validate(only).await,
        _ => {
            let Some(index) = picker.pick(candidates).await else {
                info!("operator cancelled workspace selection");
                return Err(ResolveError::Cancelled);
            };
            let Some(chosen) = candidates.get(index) else {
                warn!(index, "picker returned an out-of-range index");
                return Err(ResolveError::Cancelled);
            };
            validate(chosen).await
        }
    }
}

async fn validate(candidate: &WorkspaceCandidate) -> Result<WorkspaceRoot, ResolveError> {
    let invalid = |reason: String| ResolveError::InvalidRoot {
        path: candidate.path.display().to_string(),
        reason,
    };

    let metadata = fs::metadata(&candidate.path)
        .await
        .map_err(|error| invalid(error.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    let path = fs::canonicalize(&candidate.path)
        .await
        .map_err(|error| invalid(error.to_string()))?;

    Ok(WorkspaceRoot {
        name: candidate.name.clone(),
        path,
    })
}
