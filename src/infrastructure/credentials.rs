use crate::domain::credential::Credential;
use crate::domain::ports::{TokenSource, TokenSourceBox};
use crate::error::{OnboardingError, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type Acquisition = Shared<BoxFuture<'static, Result<Arc<Credential>>>>;

#[derive(Default)]
struct CacheState {
    current: Option<Arc<Credential>>,
    in_flight: Option<(u64, Acquisition)>,
    generation: u64,
}

/// Process-wide cache for the processor's bearer credential.
///
/// Serves the cached credential until `ttl - safety_margin` has elapsed. When a
/// new one is needed exactly one acquisition runs; every caller that arrives
/// while it is in flight awaits the same shared future and so receives the
/// same credential or the same failure.
pub struct CredentialCache {
    source: TokenSourceBox,
    safety_margin: Duration,
    state: Mutex<CacheState>,
}

impl CredentialCache {
    pub fn new(source: TokenSourceBox, safety_margin: Duration) -> Self {
        Self {
            source,
            safety_margin,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub async fn get_credential(&self) -> Result<Arc<Credential>> {
        let (generation, acquisition) = {
            let mut state = self.state.lock().await;
            // Settled, but its waiter was cancelled before recording the outcome.
            if let Some(outcome) = state
                .in_flight
                .as_ref()
                .and_then(|(_, acquisition)| acquisition.peek().cloned())
            {
                state.in_flight = None;
                if let Ok(credential) = outcome {
                    state.current = Some(credential);
                }
            }
            if let Some(current) = &state.current
                && current.is_fresh(Instant::now(), self.safety_margin)
            {
                debug!("serving cached processor credential");
                return Ok(Arc::clone(current));
            }
            match &state.in_flight {
                Some((generation, acquisition)) => (*generation, acquisition.clone()),
                None => {
                    state.generation += 1;
                    let source = Arc::clone(&self.source);
                    let acquisition = async move { source.fetch().await.map(Arc::new) }
                        .boxed()
                        .shared();
                    info!(generation = state.generation, "acquiring processor credential");
                    state.in_flight = Some((state.generation, acquisition.clone()));
                    (state.generation, acquisition)
                }
            }
        };

        let result = acquisition.await;

        let mut state = self.state.lock().await;
        if matches!(&state.in_flight, Some((g, _)) if *g == generation) {
            state.in_flight = None;
            match &result {
                Ok(credential) => state.current = Some(Arc::clone(credential)),
                Err(e) => warn!(error = %e, "processor credential acquisition failed"),
            }
        }
        result
    }

    /// Drops `rejected` if it is still the cached credential, forcing the next
    /// caller to acquire a new one.
    pub async fn invalidate(&self, rejected: &Credential) {
        let mut state = self.state.lock().await;
        if state
            .current
            .as_ref()
            .is_some_and(|current| current.token == rejected.token)
        {
            warn!("invalidating processor credential after rejection");
            state.current = None;
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// OAuth2 client-credentials grant against the processor's `/token` endpoint.
pub struct HttpTokenSource {
    http: reqwest::Client,
    token_url: Url,
    key: String,
    secret: String,
}

impl HttpTokenSource {
    pub fn new(http: reqwest::Client, token_url: Url, key: String, secret: String) -> Self {
        Self {
            http,
            token_url,
            key,
            secret,
        }
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch(&self) -> Result<Credential> {
        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.key, Some(&self.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| OnboardingError::AuthFailure(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OnboardingError::AuthFailure(format!(
                "token endpoint refused client credentials with HTTP {}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            OnboardingError::AuthFailure(format!("unreadable token response: {e}"))
        })?;
        Ok(Credential::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        ttl: Duration,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch(&self) -> Result<Credential> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credential::new(format!("token-{n}"), self.ttl))
        }
    }

    fn cache(ttl: Duration) -> (Arc<CountingSource>, CredentialCache) {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            ttl,
        });
        let cache = CredentialCache::new(source.clone(), Duration::from_secs(60));
        (source, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_until_safety_margin() {
        let (source, cache) = cache(Duration::from_secs(3600));

        let first = cache.get_credential().await.unwrap();
        let second = cache.get_credential().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(3541)).await;
        let third = cache.get_credential().await.unwrap();
        assert_eq!(third.token, "token-2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reacquisition() {
        let (source, cache) = cache(Duration::from_secs(3600));
        let first = cache.get_credential().await.unwrap();
        cache.invalidate(&first).await;
        let second = cache.get_credential().await.unwrap();
        assert_eq!(second.token, "token-2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidating_stale_credential_keeps_newer_one() {
        let (source, cache) = cache(Duration::from_secs(3600));
        let first = cache.get_credential().await.unwrap();
        cache.invalidate(&first).await;
        let second = cache.get_credential().await.unwrap();

        // A late rejection of the old token must not evict its replacement.
        cache.invalidate(&first).await;
        let third = cache.get_credential().await.unwrap();
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    /// Fails its first fetch, but only once released.
    struct GatedSource {
        calls: AtomicUsize,
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl TokenSource for GatedSource {
        async fn fetch(&self) -> Result<Credential> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                self.gate.notified().await;
                return Err(OnboardingError::AuthFailure("invalid_client".to_string()));
            }
            Ok(Credential::new(format!("token-{n}"), Duration::from_secs(3600)))
        }
    }

    #[tokio::test]
    async fn test_failure_left_by_cancelled_waiter_is_not_reused() {
        let source = Arc::new(GatedSource {
            calls: AtomicUsize::new(0),
            gate: tokio::sync::Notify::new(),
        });
        let cache = Arc::new(CredentialCache::new(source.clone(), Duration::from_secs(60)));

        let waiter = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get_credential().await }
        });
        while cache.state.lock().await.in_flight.is_none() {
            tokio::task::yield_now().await;
        }

        // Let the acquisition fail while the waiter cannot record it, then cancel the waiter.
        let state = cache.state.lock().await;
        source.gate.notify_one();
        while state
            .in_flight
            .as_ref()
            .is_some_and(|(_, acquisition)| acquisition.peek().is_none())
        {
            tokio::task::yield_now().await;
        }
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        drop(state);

        let credential = cache.get_credential().await.unwrap();
        assert_eq!(credential.token, "token-2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
