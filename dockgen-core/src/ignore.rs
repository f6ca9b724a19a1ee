//! Build-context exclusion (`.dockerignore`) policy.
//!
//! Generation must never leak credentials or drag dependency caches into
//! a build context, and must not recurse over its own output. A small
//! critical subset is enforced on every run; user additions are left
//! exactly where they are.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

pub const IGNORE_FILE: &str = ".dockerignore";

/// Entries that must be present in any exclusion file we manage.
/// Revalidation appends whichever of these are missing.
const CRITICAL_ENTRIES: &[&str] = &[
    ".git",
    ".env",
    "node_modules",
    "target",
    "dist",
    "build",
    "Dockerfile",
    "docker-compose.yml",
];

/// Comprehensive default for a freshly created exclusion file. Must be a
/// superset of [`CRITICAL_ENTRIES`].
const DEFAULT_IGNORE: &str = "\
# Version control
.git
.gitignore

# Credentials and local configuration
.env
.env.*
*.pem
*.key

# Dependency caches
node_modules
__pycache__
*.pyc
venv
.venv
target
vendor

# Build output
dist
build
out
coverage

# Editor and OS metadata
.idea
.vscode
*.swp
.DS_Store

# Generator output (avoid self-recursion into the build context)
Dockerfile
docker-compose.yml
docker-compose.yaml
.dockerignore

# Logs
npm-debug.log*
*.log
";

/// Ensures `dir` carries a usable exclusion file.
///
/// Creates the default file when none exists; otherwise appends missing
/// critical entries without deleting or reordering anything the user
/// wrote. Returns whether the file changed.
pub async fn ensure(dir: &Path) -> Result<bool> {
    let path = dir.join(IGNORE_FILE);

    if !fs::try_exists(&path)
        .await
        .with_context(|| format!("checking for {}", path.display()))?
    {
        fs::write(&path, DEFAULT_IGNORE)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        info!(path = %path.display(), "created default exclusion file");
        return Ok(true);
    }

    let existing = fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let present: HashSet<&str> = existing.lines().map(str::trim).collect();
    let missing: Vec<&str> = CRITICAL_ENTRIES
        .iter()
        .copied()
        .filter(|entry| !present.contains(entry))
        .collect();
    if missing.is_empty() {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    for entry in &missing {
        updated.push_str(entry);
        updated.push('\n');
    }
    fs::write(&path, updated)
        .await
        .with_context(|| format!("updating {}", path.display()))?;
    info!(path = %path.display(), ?missing, "restored missing critical exclusions");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn creates_default_file_when_absent() {
        let temp = tempdir().unwrap();
        assert!(ensure(temp.path()).await.unwrap());

        let content = std_fs::read_to_string(temp.path().join(IGNORE_FILE)).unwrap();
        for entry in CRITICAL_ENTRIES {
            assert!(content.lines().any(|l| l.trim() == *entry), "missing {entry}");
        }
        // A fresh default needs no repair.
        assert!(!ensure(temp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn appends_missing_critical_entries_preserving_user_content() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(IGNORE_FILE);
        std_fs::write(&path, "# mine\nmy-cache/\n.git\nnode_modules\n").unwrap();

        assert!(ensure(temp.path()).await.unwrap());

        let content = std_fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# mine\nmy-cache/\n.git\nnode_modules\n"));
        assert!(content.lines().any(|l| l == ".env"));
        assert!(content.lines().any(|l| l == "Dockerfile"));

        // Second run finds nothing to add.
        assert!(!ensure(temp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn file_without_trailing_newline_is_appended_correctly() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(IGNORE_FILE);
        std_fs::write(&path, ".git").unwrap();

        assert!(ensure(temp.path()).await.unwrap());
        let content = std_fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(".git\n"));
        assert!(content.lines().any(|l| l == ".env"));
    }
}
