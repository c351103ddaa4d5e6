//! Serialized dispatch batches.
//!
//! One batch executes at a time; batches submitted while another is
//! running are queued and drained in order when it completes. The pending
//! queue is bounded as a defensive backstop: exceeding the cap drops the
//! oldest half rather than growing without limit. After each batch the
//! queue polls the vault with exponential backoff to confirm destinations
//! landed; a timeout degrades to a warning.

use crate::config::LibraryConfig;
use crate::dispatch::dispatch;
use crate::error::DispatchFailure;
use crate::events::{FilePath, FolderPath};
use crate::tracker::SelfEventTracker;
use crate::vault::{Vault, VaultAction};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const VERIFY_INITIAL_DELAY: Duration = Duration::from_millis(10);
const VERIFY_TOTAL_BUDGET: Duration = Duration::from_millis(500);

struct QueueState {
    pending: VecDeque<Vec<VaultAction>>,
    running: bool,
}

pub struct ActionQueue {
    vault: Arc<dyn Vault>,
    tracker: Arc<SelfEventTracker>,
    state: Mutex<QueueState>,
    max_pending: usize,
}

enum VerifyTarget {
    Folder(FolderPath),
    File(FilePath),
}

impl ActionQueue {
    pub fn new(vault: Arc<dyn Vault>, tracker: Arc<SelfEventTracker>, config: &LibraryConfig) -> Self {
        Self {
            vault,
            tracker,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                running: false,
            }),
            max_pending: config.max_pending_batches,
        }
    }

    /// Submit a batch. Runs immediately if the queue is idle; otherwise
    /// the batch is parked and executed after the current one. The
    /// returned result covers the submitted batch only when it ran
    /// immediately; parked batches report failures through the log.
    pub async fn submit(&self, actions: Vec<VaultAction>) -> Result<(), Vec<DispatchFailure>> {
        if actions.is_empty() {
            return Ok(());
        }
        {
            let mut state = self.state.lock().await;
            if state.running {
                if state.pending.len() >= self.max_pending {
                    let dropped = state.pending.len() / 2;
                    warn!(
                        dropped,
                        cap = self.max_pending,
                        "Pending dispatch queue over capacity; dropping oldest half"
                    );
                    for _ in 0..dropped {
                        state.pending.pop_front();
                    }
                }
                state.pending.push_back(actions);
                debug!(pending = state.pending.len(), "Parked dispatch batch");
                return Ok(());
            }
            state.running = true;
        }

        let result = self.run_batch(actions).await;

        // Drain whatever piled up while we were executing.
        loop {
            let next = {
                let mut state = self.state.lock().await;
                match state.pending.pop_front() {
                    Some(batch) => Some(batch),
                    None => {
                        state.running = false;
                        None
                    }
                }
            };
            let Some(batch) = next else { break };
            if let Err(failures) = self.run_batch(batch).await {
                warn!(failures = failures.len(), "Parked dispatch batch had failures");
            }
        }
        result
    }

    async fn run_batch(&self, actions: Vec<VaultAction>) -> Result<(), Vec<DispatchFailure>> {
        self.tracker.register_batch(&actions);
        let targets = verification_targets(&actions);
        let result = dispatch(self.vault.as_ref(), actions).await;

        let failed_paths: Vec<String> = match &result {
            Ok(()) => Vec::new(),
            Err(failures) => failures.iter().map(|f| f.action.target_path()).collect(),
        };
        self.verify(targets, &failed_paths).await;
        result
    }

    /// Best-effort confirmation that the vault has caught up with the
    /// batch's destinations.
    async fn verify(&self, targets: Vec<VerifyTarget>, failed_paths: &[String]) {
        let mut remaining: Vec<VerifyTarget> = targets
            .into_iter()
            .filter(|target| {
                let path = match target {
                    VerifyTarget::Folder(path) => path.to_string(),
                    VerifyTarget::File(path) => path.to_string(),
                };
                !failed_paths.contains(&path)
            })
            .collect();

        let mut delay = VERIFY_INITIAL_DELAY;
        let mut spent = Duration::ZERO;
        while !remaining.is_empty() && spent < VERIFY_TOTAL_BUDGET {
            let mut unconfirmed = Vec::new();
            for target in remaining {
                let present = match &target {
                    VerifyTarget::Folder(path) => {
                        self.vault.folder_exists(path).await.unwrap_or(false)
                    }
                    VerifyTarget::File(path) => self.vault.file_exists(path).await.unwrap_or(false),
                };
                if !present {
                    unconfirmed.push(target);
                }
            }
            remaining = unconfirmed;
            if remaining.is_empty() {
                break;
            }
            tokio::time::sleep(delay).await;
            spent += delay;
            delay *= 2;
        }
        for target in &remaining {
            let path = match target {
                VerifyTarget::Folder(path) => path.to_string(),
                VerifyTarget::File(path) => path.to_string(),
            };
            warn!(path = %path, "Vault has not confirmed a dispatched destination");
        }
    }
}

fn verification_targets(actions: &[VaultAction]) -> Vec<VerifyTarget> {
    actions
        .iter()
        .filter_map(|action| match action {
            VaultAction::CreateFolder { path } => Some(VerifyTarget::Folder(path.clone())),
            VaultAction::RenameFolder { to, .. } => Some(VerifyTarget::Folder(to.clone())),
            VaultAction::UpsertFile { path, .. } => Some(VerifyTarget::File(path.clone())),
            VaultAction::RenameFile { to, .. } => Some(VerifyTarget::File(to.clone())),
            VaultAction::TrashFolder { .. }
            | VaultAction::TrashFile { .. }
            | VaultAction::ProcessFile { .. } => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;
    use std::time::Duration;

    fn queue_over(vault: Arc<MemoryVault>) -> ActionQueue {
        let tracker = Arc::new(SelfEventTracker::new(Duration::from_secs(3)));
        ActionQueue::new(vault, tracker, &LibraryConfig::default())
    }

    fn upsert(path: &str, content: &str) -> VaultAction {
        VaultAction::UpsertFile {
            path: FilePath::parse(path).unwrap(),
            content: Some(content.to_string()),
        }
    }

    #[tokio::test]
    async fn idle_queue_runs_immediately() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_folder("Library");
        let queue = queue_over(vault.clone());
        queue.submit(vec![upsert("Library/a.md", "x")]).await.unwrap();
        assert_eq!(vault.file_paths(), vec!["Library/a.md".to_string()]);
    }

    #[tokio::test]
    async fn batch_paths_are_registered_for_suppression() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_folder("Library");
        let tracker = Arc::new(SelfEventTracker::new(Duration::from_secs(3)));
        let queue = ActionQueue::new(vault.clone(), tracker.clone(), &LibraryConfig::default());
        let mut events = vault.subscribe().unwrap();

        queue.submit(vec![upsert("Library/a.md", "x")]).await.unwrap();
        let echoed = events.recv().await.unwrap();
        assert!(tracker.should_suppress(&echoed));
    }

    #[tokio::test]
    async fn failures_propagate_from_an_immediate_batch() {
        let vault = Arc::new(MemoryVault::new());
        vault.seed_folder("Library");
        let queue = queue_over(vault.clone());
        let result = queue
            .submit(vec![VaultAction::TrashFile {
                path: FilePath::parse("Library/ghost.md").unwrap(),
            }])
            .await;
        assert_eq!(result.unwrap_err().len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let vault = Arc::new(MemoryVault::new());
        let queue = queue_over(vault.clone());
        queue.submit(Vec::new()).await.unwrap();
        assert!(vault.operations().is_empty());
    }
}
