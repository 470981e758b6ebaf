//! People Data Labs person-enrichment adapter.
//!
//! `GET /v5/person/enrich` with the key in `X-Api-Key`. A 404 means no
//! record; `likelihood` is a 1–10 match score. Fields hidden by the plan come
//! back as `true` instead of a value, so contact fields are read loosely.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use leadcascade_shared::{Contact, NativeConfidence};

use super::{
    ProviderAdapter, ProviderMatch, StatusCheck, check_status, clean, decode_json, endpoint,
    transport_error,
};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.peopledatalabs.com";

#[derive(Debug, Deserialize)]
struct EnrichResponse {
    likelihood: Option<f64>,
    data: Option<PdlPerson>,
}

#[derive(Debug, Deserialize)]
struct PdlPerson {
    #[serde(default)]
    work_email: Value,
    #[serde(default)]
    recommended_personal_email: Value,
    #[serde(default)]
    mobile_phone: Value,
    #[serde(default)]
    phone_numbers: Value,
}

/// String payload of a loosely typed field, ignoring plan-masked booleans.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean(Some(s)),
        Value::Array(items) => items.iter().find_map(as_text),
        _ => None,
    }
}

/// Adapter for the People Data Labs person-enrichment API.
pub struct PeopleDataLabsAdapter {
    name: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl PeopleDataLabsAdapter {
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
impl ProviderAdapter for PeopleDataLabsAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(provider = %self.name))]
    async fn invoke(&self, contact: &Contact) -> Result<ProviderMatch, ProviderError> {
        let (first_name, last_name) = contact.name_parts();
        let mut query = vec![("first_name", first_name), ("last_name", last_name)];
        if let Some(company) = contact.company_name() {
            query.push(("company", company.to_string()));
        } else if let Some(domain) = contact.domain() {
            query.push(("company", domain));
        }
        if let Some(profile) = clean(contact.profile_url.as_deref()) {
            query.push(("profile", profile));
        }

        let response = self
            .client
            .get(endpoint(&self.base_url, "/v5/person/enrich"))
            .header("X-Api-Key", &self.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, e))?;

        if let StatusCheck::NotFound = check_status(&self.name, response.status())? {
            return Ok(ProviderMatch::none());
        }

        let body: EnrichResponse = decode_json(&self.name, response).await?;
        let Some(person) = body.data else {
            return Ok(ProviderMatch::none());
        };

        let email = as_text(&person.work_email).or_else(|| as_text(&person.recommended_personal_email));
        let phone = as_text(&person.mobile_phone).or_else(|| as_text(&person.phone_numbers));
        if email.is_none() && phone.is_none() {
            return Ok(ProviderMatch::none());
        }

        let native_confidence = body
            .likelihood
            .map(NativeConfidence::Probability)
            .unwrap_or(NativeConfidence::Found(true));

        Ok(ProviderMatch {
            email,
            phone,
            native_confidence,
        })
    }
}
