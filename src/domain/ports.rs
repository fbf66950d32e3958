use super::credential::Credential;
use super::customer::Customer;
use super::processor::{GatewayRequest, ResourceResult};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Keyed store of onboarding records.
///
/// Implementations only need to be safe for concurrent use; serializing the
/// workflow steps of one customer is the orchestrator's job.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn get(&self, customer_id: &str) -> Result<Option<Customer>>;
    async fn upsert(&self, customer: Customer) -> Result<()>;
    async fn list(&self) -> Result<Vec<Customer>>;

    /// The customer owning the given funding source, if any.
    async fn find_by_funding_source(&self, funding_source_id: &str) -> Result<Option<Customer>> {
        Ok(self.list().await?.into_iter().find(|c| {
            c.funding_source
                .as_ref()
                .is_some_and(|fs| fs.id == funding_source_id)
        }))
    }
}

/// Typed access to the remote processor.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn call(&self, request: GatewayRequest) -> Result<ResourceResult>;
}

/// Issues fresh bearer credentials for the processor.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<Credential>;
}

pub type CustomerStoreBox = Box<dyn CustomerStore>;
pub type GatewayBox = Box<dyn Gateway>;
pub type TokenSourceBox = Arc<dyn TokenSource>;
