pub mod batch;
pub mod generate;
pub mod ignore;
pub mod lock;
pub mod safety;
pub mod text;
pub mod walk;
pub mod workspace;
pub mod write;

// Public library API - the CLI (and any other front end) should only need
// these types, but the modules stay public for direct use.
pub use generate::mutex::{GenerateError, GenerationMutex};
pub use generate::pipeline::{
    Artifact, ArtifactGenerator, GenerationReport, Manifest, Pipeline, ScannedProject,
};
pub use lock::KeyedMutex;
pub use walk::TraversalBudget;
pub use workspace::{ResolveError, WorkspaceCandidate, WorkspacePicker, WorkspaceRoot};
pub use write::AtomicFileWriter;
