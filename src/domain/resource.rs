use crate::error::OnboardingError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a resource owned by the remote processor.
///
/// The processor is the identifier authority: addresses only ever come from a
/// `Location` header and are stored as-is. The short id is the last path
/// segment and is what callers of this service use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    href: String,
    id: String,
}

impl ResourceId {
    pub fn parse(href: &str) -> Result<Self, OnboardingError> {
        let url = Url::parse(href).map_err(|e| {
            OnboardingError::Validation(format!("'{href}' is not a resource address: {e}"))
        })?;
        let id = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string)
            .ok_or_else(|| {
                OnboardingError::Validation(format!("'{href}' does not name a resource"))
            })?;
        Ok(Self {
            href: href.to_string(),
            id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn url(&self) -> Result<Url, OnboardingError> {
        Url::parse(&self.href)
            .map_err(|e| OnboardingError::Validation(format!("bad resource address: {e}")))
    }
}

impl TryFrom<String> for ResourceId {
    type Error = OnboardingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceId> for String {
    fn from(resource: ResourceId) -> Self {
        resource.href
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href)
    }
}
