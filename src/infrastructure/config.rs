use super::credentials::{CredentialCache, HttpTokenSource};
use super::gateway::{HttpGateway, RetryPolicy, endpoint};
use super::in_memory::InMemoryCustomerStore;
use crate::application::orchestrator::Orchestrator;
use crate::domain::resource::ResourceId;
use crate::error::{OnboardingError, Result};
use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const SANDBOX_URL: &str = "https://api-sandbox.dwolla.com";

/// Everything needed to talk to the processor.
///
/// The secret is never serialized nor printed, so the config can be logged as-is.
#[derive(Clone, Serialize)]
pub struct ProcessorConfig {
    pub base_url: String,
    pub client_key: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Operator-owned account every payment is sent to.
    pub destination_account: String,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub token_safety_margin: Duration,
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("base_url", &self.base_url)
            .field("client_key", &self.client_key)
            .field("client_secret", &"<redacted>")
            .field("destination_account", &self.destination_account)
            .field("request_timeout", &self.request_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .field("token_safety_margin", &self.token_safety_margin)
            .finish()
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            base_url: SANDBOX_URL.to_string(),
            client_key: String::new(),
            client_secret: String::new(),
            destination_account: String::new(),
            request_timeout: Duration::from_millis(15_000),
            max_attempts: 3,
            backoff_base: Duration::from_millis(200),
            token_safety_margin: Duration::from_secs(60),
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.client_key.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(OnboardingError::Validation(
                "client key and secret are required".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(OnboardingError::Validation(
                "max attempts must be at least 1".to_string(),
            ));
        }
        self.base_url()?;
        self.destination()?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            OnboardingError::Validation(format!("invalid processor URL '{}': {e}", self.base_url))
        })?;
        if url.cannot_be_a_base() {
            return Err(OnboardingError::Validation(format!(
                "invalid processor URL '{}'",
                self.base_url
            )));
        }
        Ok(url)
    }

    pub fn destination(&self) -> Result<ResourceId> {
        ResourceId::parse(&self.destination_account).map_err(|e| {
            OnboardingError::Validation(format!("invalid destination account: {e}"))
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.backoff_base,
        }
    }

    /// Wires the reqwest gateway, credential cache and in-memory store into an
    /// orchestrator.
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        self.validate()?;
        let base_url = self.base_url()?;
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| OnboardingError::Validation(format!("cannot build HTTP client: {e}")))?;

        let token_source = HttpTokenSource::new(
            http.clone(),
            endpoint(&base_url, &["token"])?,
            self.client_key.clone(),
            self.client_secret.clone(),
        );
        let credentials = Arc::new(CredentialCache::new(
            Arc::new(token_source),
            self.token_safety_margin,
        ));
        let gateway = HttpGateway::new(http, base_url, credentials, self.retry_policy());

        Ok(Orchestrator::new(
            Box::new(InMemoryCustomerStore::new()),
            Box::new(gateway),
            self.destination()?,
        ))
    }
}
