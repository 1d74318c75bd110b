//! Registry of abortable effect tasks keyed by [`EffectId`].

use staydesk_core::effect::EffectId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;

/// Tracks the tasks spawned for `Effect::Cancellable` so that
/// `Effect::Cancel` can abort them.
///
/// Finished tasks are pruned lazily whenever a new task is registered under
/// the same id.
#[derive(Clone, Default)]
pub(crate) struct CancellationRegistry {
    tasks: Arc<Mutex<HashMap<EffectId, Vec<AbortHandle>>>>,
}

impl CancellationRegistry {
    pub(crate) fn register(&self, id: &EffectId, handle: AbortHandle) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = tasks.entry(id.clone()).or_default();
        entry.retain(|h| !h.is_finished());
        entry.push(handle);
    }

    /// Abort every task registered under `id`, returning how many were still running.
    pub(crate) fn cancel(&self, id: &EffectId) -> usize {
        let handles = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.remove(id).unwrap_or_default()
        };

        let mut aborted = 0;
        for handle in handles {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }
        aborted
    }

    /// Number of registered tasks that have not finished yet.
    pub(crate) fn active(&self, id: &EffectId) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks
            .get(id)
            .map_or(0, |handles| handles.iter().filter(|h| !h.is_finished()).count())
    }
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CancellationRegistry")
            .field("ids", &tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}
