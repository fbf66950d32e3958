use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Bearer token issued by the processor's authorization endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub issued_at: Instant,
    pub ttl: Duration,
}

impl Credential {
    pub fn new(token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            issued_at: Instant::now(),
            ttl,
        }
    }

    /// Usable until `ttl - safety_margin` has elapsed since issuance.
    pub fn is_fresh(&self, now: Instant, safety_margin: Duration) -> bool {
        let usable_for = self.ttl.saturating_sub(safety_margin);
        now < self.issued_at + usable_for
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}
