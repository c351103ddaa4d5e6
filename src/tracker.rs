//! Self-event suppression.
//!
//! Every path a dispatch batch is about to touch is registered here before
//! execution, so the change events the vault echoes back for our own
//! writes can be swallowed instead of re-entering the pipeline. Exact
//! registrations pop on first match, which keeps a genuine later user edit
//! of the same path visible. Folder-level trash/rename additionally
//! register a prefix match that only expires by TTL, because one folder
//! operation can echo an unbounded number of descendant events.
//!
//! Suppression is an optimization, not a correctness requirement: tree
//! mutations are idempotent, so an echo that slips through re-applies as a
//! no-op.

use crate::config::LibraryConfig;
use crate::events::VaultEvent;
use crate::vault::VaultAction;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

struct TrackerState {
    exact: HashMap<String, Instant>,
    prefixes: Vec<(String, Instant)>,
}

pub struct SelfEventTracker {
    ttl: Duration,
    state: Mutex<TrackerState>,
}

impl SelfEventTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(TrackerState {
                exact: HashMap::new(),
                prefixes: Vec::new(),
            }),
        }
    }

    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(Duration::from_millis(config.self_event_ttl_ms))
    }

    /// Register every path a batch is about to touch.
    pub fn register_batch(&self, actions: &[VaultAction]) {
        let now = Instant::now();
        let mut state = self.state.lock();
        sweep(&mut state, now, self.ttl);
        for action in actions {
            for path in action.touched_paths() {
                state.exact.insert(path, now);
            }
            match action {
                VaultAction::TrashFolder { path } => {
                    state.prefixes.push((path.to_string(), now));
                }
                VaultAction::RenameFolder { from, to } => {
                    state.prefixes.push((from.to_string(), now));
                    state.prefixes.push((to.to_string(), now));
                }
                _ => {}
            }
        }
    }

    /// Whether an incoming event is an echo of our own work. Exact matches
    /// are consumed; prefix matches are not.
    pub fn should_suppress(&self, event: &VaultEvent) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        sweep(&mut state, now, self.ttl);

        let paths = event.touched_paths();
        let mut exact_hit = false;
        for path in &paths {
            if state.exact.remove(path).is_some() {
                exact_hit = true;
            }
        }
        if exact_hit {
            trace!(?event, "Suppressing echoed self-event (exact)");
            return true;
        }

        let prefix_hit = paths.iter().any(|path| {
            state
                .prefixes
                .iter()
                .any(|(prefix, _)| path == prefix || path.starts_with(&format!("{}/", prefix)))
        });
        if prefix_hit {
            trace!(?event, "Suppressing echoed self-event (prefix)");
        }
        prefix_hit
    }
}

fn sweep(state: &mut TrackerState, now: Instant, ttl: Duration) {
    state.exact.retain(|_, at| now.duration_since(*at) < ttl);
    state.prefixes.retain(|(_, at)| now.duration_since(*at) < ttl);
}
