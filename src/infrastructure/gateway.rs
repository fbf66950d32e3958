use super::credentials::CredentialCache;
use crate::domain::credential::Credential;
use crate::domain::ports::Gateway;
use crate::domain::processor::{GatewayRequest, Operation, ResourceResult};
use crate::domain::resource::ResourceId;
use crate::error::{OnboardingError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue, LOCATION};
use reqwest::{Response, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Media type of every processor request and response body.
pub const HAL_JSON: &str = "application/vnd.dwolla.v1.hal+json";
pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling from `base_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Appends path segments to `base`, treating every segment as opaque.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| OnboardingError::Validation(format!("'{base}' cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Gateway to the processor's REST API over reqwest.
///
/// Every call carries the cached bearer credential. A 401 invalidates it and
/// the call is repeated once with a fresh one. Transient failures are retried
/// per `RetryPolicy`, except for transfers which are attempted exactly once.
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<CredentialCache>,
    retry: RetryPolicy,
}

impl HttpGateway {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        credentials: Arc<CredentialCache>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            retry,
        }
    }

    fn resolve(&self, request: &GatewayRequest) -> Result<Url> {
        let on_target = |segment: &str| -> Result<Url> {
            let target = request.target.as_ref().ok_or_else(|| {
                OnboardingError::Validation(format!(
                    "{} needs a target resource",
                    request.operation.as_str()
                ))
            })?;
            endpoint(&target.url()?, &[segment])
        };
        match request.operation {
            Operation::CreateCustomer => endpoint(&self.base_url, &["customers"]),
            Operation::CreateTransfer => endpoint(&self.base_url, &["transfers"]),
            Operation::AttachFundingSource => on_target("funding-sources"),
            Operation::InitiateMicroDeposits | Operation::VerifyMicroDeposits => {
                on_target("micro-deposits")
            }
        }
    }

    async fn send_authorized(&self, url: &Url, request: &GatewayRequest) -> Result<ResourceResult> {
        let credential = self.credentials.get_credential().await?;
        let response = self.send_once(url, request, &credential).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return normalize(response).await;
        }

        warn!(operation = request.operation.as_str(), "access token rejected, refreshing once");
        self.credentials.invalidate(&credential).await;
        let credential = self.credentials.get_credential().await?;
        let response = self.send_once(url, request, &credential).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(OnboardingError::AuthFailure(
                "processor rejected a freshly issued access token".to_string(),
            ));
        }
        normalize(response).await
    }

    async fn send_once(
        &self,
        url: &Url,
        request: &GatewayRequest,
        credential: &Credential,
    ) -> Result<Response> {
        let mut builder = self
            .http
            .post(url.clone())
            .bearer_auth(&credential.token)
            .header(ACCEPT, HAL_JSON);
        if let Some(payload) = &request.payload {
            let body = serde_json::to_vec(payload).map_err(|e| {
                OnboardingError::Validation(format!("cannot encode request body: {e}"))
            })?;
            builder = builder.header(CONTENT_TYPE, HAL_JSON).body(body);
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY, key);
        }
        builder.send().await.map_err(transport_failure)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    #[instrument(skip_all, fields(operation = request.operation.as_str()))]
    async fn call(&self, request: GatewayRequest) -> Result<ResourceResult> {
        let url = self.resolve(&request)?;
        let max_attempts = if request.operation.is_retryable() {
            self.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            match self.send_authorized(&url, &request).await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(attempt, ?delay, error = %e, "transient processor failure, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => {
                    debug!(attempt, ok = outcome.is_ok(), "processor call finished");
                    return outcome;
                }
            }
        }
    }
}

fn transport_failure(err: reqwest::Error) -> OnboardingError {
    if err.is_timeout() {
        OnboardingError::TransientFailure("processor call timed out".to_string())
    } else {
        OnboardingError::TransientFailure(format!("processor unreachable: {err}"))
    }
}

/// Maps a processor response onto the error taxonomy.
async fn normalize(response: Response) -> Result<ResourceResult> {
    let status = response.status();
    let location = if status.is_success() {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| resolve_location(response.url(), value))
    } else {
        None
    };
    let bytes = response.bytes().await.map_err(transport_failure)?;
    let body: Option<Value> = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };

    if status.is_success() {
        return Ok(ResourceResult {
            status: status.as_u16(),
            location,
            body,
        });
    }
    if status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
    {
        let (code, detail) = provider_detail(body.as_ref(), status);
        return Err(OnboardingError::RequestRejected {
            status: status.as_u16(),
            code,
            detail,
        });
    }
    Err(OnboardingError::TransientFailure(format!(
        "processor answered HTTP {}",
        status.as_u16()
    )))
}

/// Resolves a `Location` header against the URL it answered, so relative
/// addresses such as `/customers/c1` are accepted. An unreadable header is
/// dropped; the caller then sees a created resource without an address.
fn resolve_location(request_url: &Url, value: &HeaderValue) -> Option<ResourceId> {
    let resolved = value
        .to_str()
        .map_err(|e| e.to_string())
        .and_then(|raw| request_url.join(raw).map_err(|e| format!("'{raw}': {e}")))
        .and_then(|url| ResourceId::parse(url.as_str()).map_err(|e| e.to_string()));
    match resolved {
        Ok(resource) => Some(resource),
        Err(detail) => {
            warn!(%detail, "unreadable Location header from processor");
            None
        }
    }
}

/// Pulls `code` and a readable message out of a processor error body,
/// including the nested `_embedded.errors` list.
fn provider_detail(body: Option<&Value>, status: StatusCode) -> (String, String) {
    let fallback_code = status
        .canonical_reason()
        .unwrap_or("Rejected")
        .replace(' ', "");
    let Some(body) = body else {
        return (fallback_code, format!("HTTP {}", status.as_u16()));
    };

    let code = body
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(fallback_code);
    let mut messages: Vec<String> = body
        .get("message")
        .and_then(Value::as_str)
        .map(|m| vec![m.to_string()])
        .unwrap_or_default();
    if let Some(errors) = body
        .pointer("/_embedded/errors")
        .and_then(Value::as_array)
    {
        messages.extend(errors.iter().filter_map(|e| {
            let message = e.get("message").and_then(Value::as_str)?;
            Some(match e.get("path").and_then(Value::as_str) {
                Some(path) => format!("{path}: {message}"),
                None => message.to_string(),
            })
        }));
    }
    let detail = if messages.is_empty() {
        body.to_string()
    } else {
        messages.join("; ")
    };
    (code, detail)
}
