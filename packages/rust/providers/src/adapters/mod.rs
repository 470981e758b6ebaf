//! Provider adapter trait and built-in vendor adapters.
//!
//! Each adapter speaks one vendor's HTTP/JSON dialect and reduces the reply
//! to a [`ProviderMatch`]. Adapters are selected from configuration by
//! [`build_adapter`]; nothing downstream inspects concrete adapter types.

mod apollo;
mod hunter;
mod lusha;
mod peopledatalabs;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use leadcascade_shared::{
    Contact, LeadCascadeError, NativeConfidence, ProviderConfig, ProviderKind, Result,
};

use crate::error::ProviderError;

pub use apollo::ApolloAdapter;
pub use hunter::HunterAdapter;
pub use lusha::LushaAdapter;
pub use peopledatalabs::PeopleDataLabsAdapter;

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("LeadCascade/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// What a vendor returned for one contact.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMatch {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub native_confidence: NativeConfidence,
}

impl ProviderMatch {
    /// The vendor answered but had nothing for this contact.
    pub fn none() -> Self {
        Self {
            email: None,
            phone: None,
            native_confidence: NativeConfidence::Absent,
        }
    }
}

/// Uniform contract over one external data vendor.
///
/// One call to [`invoke`](ProviderAdapter::invoke) is at most one outbound
/// request. Timeouts, retries and rate limiting are applied by the pool.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Configured provider name, used in outcomes and logs.
    fn name(&self) -> &str;

    /// Look the contact up.
    async fn invoke(&self, contact: &Contact) -> std::result::Result<ProviderMatch, ProviderError>;
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Build the adapter for a provider entry.
pub fn build_adapter(config: &ProviderConfig, api_key: String) -> Result<Arc<dyn ProviderAdapter>> {
    let client = build_client(Duration::from_millis(config.timeout_ms))?;
    let base_url = config.base_url.clone();
    let name = config.name.clone();

    let adapter: Arc<dyn ProviderAdapter> = match config.kind {
        ProviderKind::Hunter => Arc::new(HunterAdapter::new(name, api_key, base_url, client)),
        ProviderKind::Apollo => Arc::new(ApolloAdapter::new(name, api_key, base_url, client)),
        ProviderKind::PeopleDataLabs => {
            Arc::new(PeopleDataLabsAdapter::new(name, api_key, base_url, client))
        }
        ProviderKind::Lusha => Arc::new(LushaAdapter::new(name, api_key, base_url, client)),
    };
    Ok(adapter)
}

/// Build a reqwest client with the provider's per-call timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(3))
        .timeout(timeout)
        .build()
        .map_err(|e| LeadCascadeError::Network(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

/// Join a base URL and an API path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a transport-level reqwest failure onto the provider taxonomy.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(format!("{provider}: {err}"))
    } else if err.is_decode() {
        ProviderError::InvalidResponse(format!("{provider}: {err}"))
    } else {
        ProviderError::Unavailable(format!("{provider}: {err}"))
    }
}

/// Outcome of inspecting an HTTP status before decoding the body.
pub(crate) enum StatusCheck {
    /// 2xx: decode the body.
    Proceed,
    /// 404: the vendor has no record of this person.
    NotFound,
}

/// Map an HTTP status onto the provider taxonomy.
pub(crate) fn check_status(
    provider: &str,
    status: StatusCode,
) -> std::result::Result<StatusCheck, ProviderError> {
    match status {
        s if s.is_success() => Ok(StatusCheck::Proceed),
        StatusCode::NOT_FOUND => Ok(StatusCheck::NotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ProviderError::Auth(format!("{provider}: HTTP {status}")))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Err(ProviderError::RateLimited(format!("{provider}: HTTP {status}")))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            Err(ProviderError::Timeout(format!("{provider}: HTTP {status}")))
        }
        _ => Err(ProviderError::Unavailable(format!("{provider}: HTTP {status}"))),
    }
}

/// Read the body and decode it as JSON, mapping failures to `InvalidResponse`.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    provider: &str,
    response: Response,
) -> std::result::Result<T, ProviderError> {
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;

    serde_json::from_str(&body).map_err(|e| {
        let snippet: String = body.chars().take(200).collect();
        ProviderError::InvalidResponse(format!("{provider}: {e} (got: {snippet})"))
    })
}

/// Trimmed, non-empty string or `None`.
pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// LinkedIn handle (`/in/<handle>`) from a profile URL, if present.
pub(crate) fn linkedin_handle(profile_url: Option<&str>) -> Option<String> {
    let url = url::Url::parse(profile_url?.trim()).ok()?;
    let host = url.host_str()?;
    if !host.ends_with("linkedin.com") {
        return None;
    }
    let mut segments = url.path_segments()?;
    match (segments.next(), segments.next()) {
        (Some("in"), Some(handle)) if !handle.is_empty() => Some(handle.to_string()),
        _ => None,
    }
}
