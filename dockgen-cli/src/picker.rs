//! Operator-facing workspace disambiguation.

use async_trait::async_trait;
use tracing::warn;

use dockgen_core::{WorkspaceCandidate, WorkspacePicker};

/// Numbered stdin menu. Empty input or anything unparsable counts as a
/// cancellation, matching editor quick-pick dismissal.
pub struct StdinPicker;

#[async_trait]
impl WorkspacePicker for StdinPicker {
    async fn pick(&self, candidates: &[WorkspaceCandidate]) -> Option<usize> {
        println!("Multiple workspace roots are open:");
        for (i, candidate) in candidates.iter().enumerate() {
            println!("  {}) {}  [{}]", i + 1, candidate.name, candidate.path.display());
        }
        print!("Generate for which one? (1-{}, empty to cancel): ", candidates.len());
        use std::io::Write;
        let _ = std::io::stdout().flush();

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        let line = match line {
            Ok(Ok(line)) => line,
            _ => {
                warn!("failed to read selection from stdin");
                return None;
            }
        };
        let choice: usize = line.trim().parse().ok()?;
        if choice == 0 || choice > candidates.len() {
            return None;
        }
        Some(choice - 1)
    }
}

/// Non-interactive picker for `--yes`: always the first candidate.
pub struct FirstPicker;

#[async_trait]
impl WorkspacePicker for FirstPicker {
    async fn pick(&self, _candidates: &[WorkspaceCandidate]) -> Option<usize> {
        Some(0)
    }
}
