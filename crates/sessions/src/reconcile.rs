//! Push context edits made by local handlers back to the NLU backend.
//!
//! The output contexts of a response are snapshotted before and after the
//! handler pipeline. Every context whose serialized form changed is updated
//! in the backend on a background task, bounded by a shared semaphore.

use std::{collections::BTreeMap, sync::Arc};

use {
    bpi_client::NluClient,
    bpi_protocol::{Context, DetectIntentResponse},
    tokio::{sync::Semaphore, task::JoinHandle},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use bpi_metrics::{counter, reconcile as reconcile_metrics};

/// Context name to (canonical JSON, context).
pub type ContextSnapshot = BTreeMap<String, (String, Context)>;

#[must_use]
pub fn snapshot(response: &DetectIntentResponse) -> ContextSnapshot {
    response
        .contexts()
        .iter()
        .map(|c| (c.name.clone(), (c.canonical_json(), c.clone())))
        .collect()
}

/// Contexts present in both snapshots whose serialized form differs, in
/// their `after` state.
///
/// Contexts added or removed by handlers are not reported.
#[must_use]
pub fn changed(before: &ContextSnapshot, after: &ContextSnapshot) -> Vec<Context> {
    after
        .iter()
        .filter_map(|(name, (json, context))| match before.get(name) {
            Some((old, _)) if old != json => Some(context.clone()),
            _ => None,
        })
        .collect()
}

/// Runs context updates against the backend with bounded concurrency.
#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn NluClient>,
    permits: Arc<Semaphore>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn NluClient>, max_concurrency: usize) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Spawn one update task per changed context and return at once.
    pub fn reconcile(&self, before: &ContextSnapshot, after: &ContextSnapshot) -> ReconcileHandle {
        let tasks = changed(before, after)
            .into_iter()
            .filter(|context| {
                if context.is_alive() {
                    return true;
                }
                debug!(
                    context = %context.name,
                    lifespan = context.lifespan_count,
                    "context expired, not updating"
                );
                #[cfg(feature = "metrics")]
                counter!(reconcile_metrics::SKIPPED_TOTAL).increment(1);
                false
            })
            .map(|context| {
                let client = Arc::clone(&self.client);
                let permits = Arc::clone(&self.permits);
                tokio::spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    update_context(client.as_ref(), context).await;
                })
            })
            .collect();
        ReconcileHandle { tasks }
    }
}

async fn update_context(client: &dyn NluClient, context: Context) {
    let name = context.name.clone();
    match client.update_context(context.without_audit()).await {
        Ok(_) => {
            debug!(context = %name, "context updated in backend");
            #[cfg(feature = "metrics")]
            counter!(reconcile_metrics::UPDATES_TOTAL).increment(1);
        },
        Err(e) => {
            warn!(context = %name, error = %e, "context update failed");
            #[cfg(feature = "metrics")]
            counter!(reconcile_metrics::ERRORS_TOTAL).increment(1);
        },
    }
}

/// The update tasks of one reconciliation. Dropping it detaches them.
#[must_use = "drop the handle to detach, or await `wait`"]
pub struct ReconcileHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl ReconcileHandle {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every update to finish.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "context update task panicked");
            }
        }
    }
}
