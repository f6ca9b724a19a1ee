//! End-to-end generation flow.
//!
//! The pipeline owns the substrate (walker budget, per-root mutex,
//! atomic writer) and treats the actual classify/select/render logic as
//! a black box behind [`ArtifactGenerator`]: it gets a scanned project,
//! it answers with text artifacts. Whatever it answers is persisted
//! safely; its semantic correctness is not this crate's problem.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::generate::mutex::{GenerateError, GenerationMutex};
use crate::walk::TraversalBudget;
use crate::workspace::WorkspaceRoot;
use crate::write::AtomicFileWriter;
use crate::{batch, ignore, safety, text, walk};

/// Manifest files worth reading during the scan. Non-JSON manifests
/// still matter for classification by presence; their `data` stays
/// `None`.
const MANIFEST_NAMES: &[&str] = &[
    "package.json",
    "composer.json",
    "tsconfig.json",
    "Cargo.toml",
    "go.mod",
    "requirements.txt",
    "pyproject.toml",
    "pom.xml",
    "build.gradle",
];

/// One generated output file, addressed relative to the workspace root.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub rel_path: String,
    pub content: String,
}

/// A manifest discovered during the scan. `data` is `Some` only when the
/// file parsed as JSON; callers must treat `None` as "no usable data".
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    pub data: Option<serde_json::Value>,
}

/// Everything the black-box generator gets to look at.
#[derive(Debug, Clone)]
pub struct ScannedProject {
    pub root: WorkspaceRoot,
    pub files: Vec<PathBuf>,
    pub manifests: Vec<Manifest>,
}

/// The classify/select/render seam. Implementations are pure lookups and
/// string assembly; all filesystem safety stays on this side.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(&self, project: &ScannedProject) -> anyhow::Result<Vec<Artifact>>;
}

/// Summary of one generation. Clonable so the per-root mutex can hand
/// the same report to every caller that joined the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub root: PathBuf,
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    pub ignore_updated: bool,
}

pub struct Pipeline {
    mutex: GenerationMutex<GenerationReport>,
    writer: AtomicFileWriter,
    budget: TraversalBudget,
    chunk_size: usize,
}

impl Pipeline {
    pub fn new(budget: TraversalBudget, chunk_size: usize) -> Self {
        Self {
            mutex: GenerationMutex::new(),
            writer: AtomicFileWriter::new(),
            budget,
            chunk_size,
        }
    }

    /// Runs one generation for `root`, or joins the one already running
    /// for it.
    pub async fn generate(
        &self,
        root: &WorkspaceRoot,
        generator: &dyn ArtifactGenerator,
    ) -> Result<GenerationReport, GenerateError> {
        self.mutex
            .run(&root.path, || self.run_once(root, generator))
            .await
    }

    async fn run_once(
        &self,
        root: &WorkspaceRoot,
        generator: &dyn ArtifactGenerator,
    ) -> Result<GenerationReport, GenerateError> {
        let files = walk::walk(&root.path, &self.budget).await;
        info!(root = %root.path.display(), files = files.len(), "scanned workspace");

        let candidates: Vec<PathBuf> = files
            .iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| MANIFEST_NAMES.contains(&name))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        let manifests = batch::run_chunked(candidates, self.chunk_size, |path| async move {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading manifest {}", path.display()))?;
            Ok(Some(Manifest {
                data: text::parse_structured(&raw),
                path,
            }))
        })
        .await;

        let project = ScannedProject {
            root: root.clone(),
            files,
            manifests,
        };
        let artifacts = generator
            .generate(&project)
            .await
            .map_err(GenerateError::failed)?;

        let ignore_updated = ignore::ensure(&root.path)
            .await
            .map_err(GenerateError::failed)?;

        let mut written = Vec::new();
        let mut skipped = Vec::new();
        for artifact in artifacts {
            if !safety::is_valid_path(&artifact.rel_path)
                || Path::new(&artifact.rel_path).is_absolute()
            {
                warn!(rel_path = %artifact.rel_path, "rejecting unsafe artifact destination");
                skipped.push(artifact.rel_path);
                continue;
            }
            let dest = root.path.join(&artifact.rel_path);
            if self.writer.write_atomic(&dest, &artifact.content).await {
                written.push(artifact.rel_path);
            } else {
                skipped.push(artifact.rel_path);
            }
        }

        info!(
            root = %root.path.display(),
            written = written.len(),
            skipped = skipped.len(),
            "generation finished"
        );
        Ok(GenerationReport {
            root: root.path.clone(),
            written,
            skipped,
            ignore_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::tempdir;

    struct FixedArtifacts(Vec<Artifact>);

    #[async_trait]
    impl ArtifactGenerator for FixedArtifacts {
        async fn generate(&self, _project: &ScannedProject) -> anyhow::Result<Vec<Artifact>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl ArtifactGenerator for Failing {
        async fn generate(&self, _project: &ScannedProject) -> anyhow::Result<Vec<Artifact>> {
            anyhow::bail!("no topology for this project")
        }
    }

    struct AssertManifests;

    #[async_trait]
    impl ArtifactGenerator for AssertManifests {
        async fn generate(&self, project: &ScannedProject) -> anyhow::Result<Vec<Artifact>> {
            let manifest = project
                .manifests
                .iter()
                .find(|m| m.path.ends_with("package.json"))
                .expect("package.json not scanned");
            let data = manifest.data.as_ref().expect("package.json did not parse");
            assert_eq!(data["name"], "demo");
            // Malformed manifest still present, with no usable data.
            let broken = project
                .manifests
                .iter()
                .find(|m| m.path.ends_with("composer.json"))
                .expect("composer.json not scanned");
            assert!(broken.data.is_none());
            Ok(vec![])
        }
    }

    fn workspace(temp: &tempfile::TempDir) -> WorkspaceRoot {
        WorkspaceRoot {
            name: "demo".to_string(),
            path: temp.path().canonicalize().unwrap(),
        }
    }

    #[tokio::test]
    async fn writes_artifacts_and_ignore_file() {
        let temp = tempdir().unwrap();
        std_fs::write(temp.path().join("package.json"), "{\"name\": \"demo\"}").unwrap();
        let root = workspace(&temp);

        let pipeline = Pipeline::new(TraversalBudget::default(), 16);
        let generator = FixedArtifacts(vec![
            Artifact {
                rel_path: "Dockerfile".to_string(),
                content: "FROM node:20\n".to_string(),
            },
            Artifact {
                rel_path: "docker-compose.yml".to_string(),
                content: "services: {}\n".to_string(),
            },
        ]);

        let report = pipeline.generate(&root, &generator).await.unwrap();
        assert_eq!(report.written.len(), 2);
        assert!(report.skipped.is_empty());
        assert!(report.ignore_updated);
        assert!(temp.path().join("Dockerfile").exists());
        assert!(temp.path().join(".dockerignore").exists());

        // No staging residue after a full run.
        let residue: Vec<_> = std_fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp") || n.ends_with(".backup"))
            .collect();
        assert!(residue.is_empty());
    }

    #[tokio::test]
    async fn unsafe_destinations_are_skipped() {
        let temp = tempdir().unwrap();
        let root = workspace(&temp);

        let pipeline = Pipeline::new(TraversalBudget::default(), 16);
        let generator = FixedArtifacts(vec![Artifact {
            rel_path: "../outside".to_string(),
            content: "should never land".to_string(),
        }]);

        let report = pipeline.generate(&root, &generator).await.unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.skipped, vec!["../outside".to_string()]);
        assert!(!temp.path().parent().unwrap().join("outside").exists());
    }

    #[tokio::test]
    async fn generator_failure_surfaces_and_releases_the_root() {
        let temp = tempdir().unwrap();
        let root = workspace(&temp);

        let pipeline = Pipeline::new(TraversalBudget::default(), 16);
        let result = pipeline.generate(&root, &Failing).await;
        assert!(matches!(result, Err(GenerateError::Failed(_))));

        // A later attempt is not blocked by the failed one.
        let report = pipeline
            .generate(&root, &FixedArtifacts(vec![]))
            .await
            .unwrap();
        assert!(report.written.is_empty());
    }

    #[tokio::test]
    async fn manifests_are_parsed_defensively() {
        let temp = tempdir().unwrap();
        std_fs::write(temp.path().join("package.json"), "{\"name\": \"demo\"}").unwrap();
        std_fs::write(temp.path().join("composer.json"), "{ not json").unwrap();
        let root = workspace(&temp);

        let pipeline = Pipeline::new(TraversalBudget::default(), 16);
        pipeline.generate(&root, &AssertManifests).await.unwrap();
    }
}
