//! Apollo people-match adapter.
//!
//! `POST /v1/people/match` with the key in `X-Api-Key`. Confidence comes as
//! the categorical `email_status` label.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use leadcascade_shared::{Contact, NativeConfidence};

use super::{
    ProviderAdapter, ProviderMatch, StatusCheck, check_status, clean, decode_json, endpoint,
    transport_error,
};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.apollo.io";

/// Apollo answers with this placeholder when the email is not unlocked for the plan.
const LOCKED_EMAIL_PREFIX: &str = "email_not_unlocked@";

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    first_name: &'a str,
    last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linkedin_url: Option<&'a str>,
    reveal_personal_emails: bool,
}

#[derive(Debug, Deserialize)]
struct MatchResponse {
    person: Option<ApolloPerson>,
}

#[derive(Debug, Deserialize)]
struct ApolloPerson {
    email: Option<String>,
    email_status: Option<String>,
    #[serde(default)]
    phone_numbers: Vec<ApolloPhone>,
}

#[derive(Debug, Deserialize)]
struct ApolloPhone {
    sanitized_number: Option<String>,
    raw_number: Option<String>,
}

/// Adapter for the Apollo people-match API.
pub struct ApolloAdapter {
    name: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl ApolloAdapter {
    pub fn new(name: String, api_key: String, base_url: Option<String>, client: Client) -> Self {
        Self {
            name,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            client,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ApolloAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(provider = %self.name))]
    async fn invoke(&self, contact: &Contact) -> Result<ProviderMatch, ProviderError> {
        let (first_name, last_name) = contact.name_parts();
        let domain = contact.domain();
        let request = MatchRequest {
            first_name: &first_name,
            last_name: &last_name,
            name: contact.full_name.as_deref(),
            organization_name: contact.company_name(),
            domain: domain.as_deref(),
            linkedin_url: contact.profile_url.as_deref(),
            reveal_personal_emails: false,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "/v1/people/match"))
            .header("X-Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, e))?;

        if let StatusCheck::NotFound = check_status(&self.name, response.status())? {
            return Ok(ProviderMatch::none());
        }

        let body: MatchResponse = decode_json(&self.name, response).await?;
        let Some(person) = body.person else {
            return Ok(ProviderMatch::none());
        };

        let email = clean(person.email.as_deref())
            .filter(|e| !e.starts_with(LOCKED_EMAIL_PREFIX));
        let phone = person
            .phone_numbers
            .iter()
            .find_map(|p| clean(p.sanitized_number.as_deref().or(p.raw_number.as_deref())));

        if email.is_none() && phone.is_none() {
            return Ok(ProviderMatch::none());
        }

        let label = person
            .email_status
            .unwrap_or_else(|| "unavailable".into())
            .to_lowercase();

        Ok(ProviderMatch {
            email,
            phone,
            native_confidence: NativeConfidence::Label(label),
        })
    }
}
