//! At most one generation per workspace root.
//!
//! A caller that finds a generation already running for its root does
//! not start a second run: it awaits the in-flight one and shares its
//! result. (The alternative, wait-then-re-run, applies two full
//! generations back to back for no benefit.) The in-flight entry is
//! removed on success, failure, and cancellation alike, so a failed run
//! can never wedge a root.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

/// Generation failure, clonable so one outcome can fan out to every
/// waiter on the same root.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("generation failed: {0}")]
    Failed(String),
    #[error("in-flight generation for {0} was abandoned before completing")]
    Abandoned(String),
}

impl GenerateError {
    pub fn failed(error: anyhow::Error) -> Self {
        Self::Failed(format!("{error:#}"))
    }
}

type Outcome<T> = Result<T, GenerateError>;
type OutcomeRx<T> = watch::Receiver<Option<Outcome<T>>>;

enum Role<T> {
    Leader(watch::Sender<Option<Outcome<T>>>),
    Waiter(OutcomeRx<T>),
}

/// Per-root Idle -> Running -> Idle serialization with result sharing.
pub struct GenerationMutex<T> {
    inflight: Arc<StdMutex<HashMap<PathBuf, OutcomeRx<T>>>>,
}

impl<T: Clone> Default for GenerationMutex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> GenerationMutex<T> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Runs `op` for `root`, or joins the run already in flight.
    ///
    /// The leader executes `op`, publishes the outcome to any waiters,
    /// and clears the in-flight entry via an RAII guard - the entry goes
    /// away even if the leader's future is dropped mid-run, in which
    /// case waiters observe [`GenerateError::Abandoned`].
    pub async fn run<F, Fut>(&self, root: &Path, op: F) -> Outcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let role = {
            let mut inflight = self.inflight.lock().expect("inflight table poisoned");
            match inflight.get(root) {
                Some(rx) => Role::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(root.to_path_buf(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let _cleanup = InflightGuard {
                    inflight: self.inflight.clone(),
                    root: root.to_path_buf(),
                };
                let outcome = op().await;
                let _ = tx.send(Some(outcome.clone()));
                outcome
            }
            Role::Waiter(mut rx) => {
                debug!(root = %root.display(), "generation already running; awaiting its result");
                loop {
                    if let Some(outcome) = rx.borrow_and_update().clone() {
                        return outcome;
                    }
                    if rx.changed().await.is_err() {
                        // Leader dropped without publishing.
                        return Err(GenerateError::Abandoned(root.display().to_string()));
                    }
                }
            }
        }
    }

    /// True while a generation for `root` is in flight. Test hook.
    pub fn is_running(&self, root: &Path) -> bool {
        self.inflight
            .lock()
            .expect("inflight table poisoned")
            .contains_key(root)
    }
}

struct InflightGuard<T> {
    inflight: Arc<StdMutex<HashMap<PathBuf, OutcomeRx<T>>>>,
    root: PathBuf,
}

impl<T> Drop for InflightGuard<T> {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .expect("inflight table poisoned")
            .remove(&self.root);
    }
}
