//! Application state for API handlers

use crate::application::orchestrator::Orchestrator;
use crate::error::{OnboardingError, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub version: String,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Runs a workflow step on its own task and waits for it.
    ///
    /// A client that disconnects only drops the wait: the step keeps its
    /// customer lock, finishes the processor call and records the outcome.
    pub async fn run_step<T, F, Fut>(&self, step: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Orchestrator>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let task = tokio::spawn(step(Arc::clone(&self.orchestrator)));
        task.await.unwrap_or_else(|e| {
            error!(error = %e, "workflow step task failed");
            Err(OnboardingError::Storage(format!("workflow step did not complete: {e}")))
        })
    }
}
