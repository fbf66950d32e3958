use crate::domain::customer::Customer;
use crate::domain::ports::CustomerStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for onboarding records.
///
/// Uses `Arc<RwLock<HashMap<String, Customer>>>` so clones share the same map.
/// Not durable: a restart loses every in-flight onboarding.
#[derive(Default, Clone)]
pub struct InMemoryCustomerStore {
    customers: Arc<RwLock<HashMap<String, Customer>>>,
    // funding source id -> customer id
    funding_sources: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryCustomerStore {
    /// Creates a new, empty in-memory customer store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn get(&self, customer_id: &str) -> Result<Option<Customer>> {
        let customers = self.customers.read().await;
        Ok(customers.get(customer_id).cloned())
    }

    async fn upsert(&self, customer: Customer) -> Result<()> {
        if let Some(fs) = &customer.funding_source {
            let mut index = self.funding_sources.write().await;
            index.insert(fs.id.clone(), customer.id.clone());
        }
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.clone(), customer);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Customer>> {
        let customers = self.customers.read().await;
        let mut all: Vec<Customer> = customers.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn find_by_funding_source(&self, funding_source_id: &str) -> Result<Option<Customer>> {
        let customer_id = {
            let index = self.funding_sources.read().await;
            index.get(funding_source_id).cloned()
        };
        match customer_id {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }
}
