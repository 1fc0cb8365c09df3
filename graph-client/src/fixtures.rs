//! Bookkeeping for objects a test scenario creates on the remote service.
//!
//! Scenarios register every object they create; cleanup deletes them after
//! the scenario finishes, whether it passed or not. Cleanup failures are
//! logged and reported, never raised, so they cannot mask the scenario result.

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use crate::api_client::GraphClient;
use crate::error::GraphError;

/// Identifiers of objects created during one scenario
///
/// Cloning yields a handle onto the same registry, so the scenario body can
/// register objects while the harness keeps ownership of cleanup.
#[derive(Debug, Clone, Default)]
pub struct FixtureManager {
    registered: Arc<Mutex<Vec<String>>>,
}

/// Why a registered object could not be removed
#[derive(Debug)]
pub enum CleanupFailure {
    /// The delete call returned `false`
    NotConfirmed { id: String },
    /// The delete call failed
    Failed { id: String, error: GraphError },
}

impl CleanupFailure {
    pub fn id(&self) -> &str {
        match self {
            CleanupFailure::NotConfirmed { id } | CleanupFailure::Failed { id, .. } => id,
        }
    }
}

/// Outcome of [`FixtureManager::cleanup`]
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl FixtureManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one object for deletion at cleanup
    pub fn register(&self, identifier: impl Into<String>) {
        let identifier = identifier.into();
        tracing::debug!("Registered temporary object {}", identifier);
        self.lock().push(identifier);
    }

    pub fn registered(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Delete every registered object, newest first, and drain the registry
    pub async fn cleanup(&self, client: &GraphClient) -> CleanupReport {
        let pending: Vec<String> = std::mem::take(&mut *self.lock());
        let mut report = CleanupReport::default();

        for id in pending.into_iter().rev() {
            tracing::info!("Cleaning up temporary object {}", id);
            match client.delete_object(&id).await {
                Ok(true) => report.deleted.push(id),
                Ok(false) => {
                    tracing::warn!("Unable to clean up temporary object {}: delete not confirmed", id);
                    report.failures.push(CleanupFailure::NotConfirmed { id });
                }
                Err(error) => {
                    tracing::warn!("Unable to clean up temporary object {}: {}", id, error);
                    report.failures.push(CleanupFailure::Failed { id, error });
                }
            }
        }

        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        // A panicking scenario must not prevent cleanup
        self.registered.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run `scenario` with a fresh [`FixtureManager`], then clean up.
///
/// Cleanup runs even if the scenario panics; the panic is resumed afterwards.
pub async fn with_fixtures<T, F, Fut>(client: &GraphClient, scenario: F) -> (T, CleanupReport)
where
    F: FnOnce(FixtureManager) -> Fut,
    Fut: Future<Output = T>,
{
    let fixtures = FixtureManager::new();
    let outcome = AssertUnwindSafe(scenario(fixtures.clone()))
        .catch_unwind()
        .await;
    let report = fixtures.cleanup(client).await;

    match outcome {
        Ok(value) => (value, report),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
