use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per customer id.
///
/// Workflow steps for the same customer queue up behind each other while
/// steps for different customers never contend. Entries live as long as the
/// process since customer records are never deleted.
#[derive(Default)]
pub struct CustomerLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CustomerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, customer_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(customer_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
