//! Lusha person adapter.
//!
//! `GET /v2/person` with the key in an `api_key` header. Lusha gives no
//! score, only whether contact data was found.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use leadcascade_shared::{Contact, NativeConfidence};

use super::{
    ProviderAdapter, ProviderMatch, StatusCheck, check_status, clean, decode_json, endpoint,
    transport_error,
};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.lusha.com";

#[derive(Debug, Deserialize)]
struct PersonResponse {
    contact: Option<LushaContact>,
}

#[derive(Debug, Deserialize)]
struct LushaContact {
    data: Option<LushaData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LushaData {
    #[serde(default)]
    email_addresses: Vec<LushaEmail>,
    #[serde(default)]
    phone_numbers: Vec<LushaPhone>,
}

#[derive(Debug, Deserialize)]
struct LushaEmail {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LushaPhone {
    number: Option<String>,
    phone_type: Option<String>,
}

/// Adapter for the Lusha person API.
pub struct LushaAdapter {
    name: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl LushaAdapter {
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
impl ProviderAdapter for LushaAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(provider = %self.name))]
    async fn invoke(&self, contact: &Contact) -> Result<ProviderMatch, ProviderError> {
        let (first_name, last_name) = contact.name_parts();
        let mut query = vec![("firstName", first_name), ("lastName", last_name)];
        if let Some(company) = contact.company_name() {
            query.push(("companyName", company.to_string()));
        }
        if let Some(domain) = contact.domain() {
            query.push(("companyDomain", domain));
        }
        if let Some(profile) = clean(contact.profile_url.as_deref()) {
            query.push(("linkedinUrl", profile));
        }

        let response = self
            .client
            .get(endpoint(&self.base_url, "/v2/person"))
            .header("api_key", &self.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, e))?;

        if let StatusCheck::NotFound = check_status(&self.name, response.status())? {
            return Ok(ProviderMatch::none());
        }

        let body: PersonResponse = decode_json(&self.name, response).await?;
        let Some(data) = body.contact.and_then(|c| c.data) else {
            return Ok(ProviderMatch::none());
        };

        let email = data
            .email_addresses
            .iter()
            .find_map(|e| clean(e.email.as_deref()));

        // Prefer a mobile number when several are listed
        let phone = data
            .phone_numbers
            .iter()
            .find(|p| p.phone_type.as_deref() == Some("mobile"))
            .or_else(|| data.phone_numbers.first())
            .and_then(|p| clean(p.number.as_deref()));

        let found = email.is_some() || phone.is_some();
        if !found {
            return Ok(ProviderMatch::none());
        }

        Ok(ProviderMatch {
            email,
            phone,
            native_confidence: NativeConfidence::Found(found),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> LushaAdapter {
        let client = super::super::build_client(Duration::from_secs(5)).unwrap();
        LushaAdapter::new("lusha".into(), "lk".into(), Some(server.uri()), client)
    }

    #[tokio::test]
    async fn prefers_mobile_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/person"))
            .and(header("api_key", "lk"))
            .and(query_param("firstName", "Jane"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "contact": {
                    "data": {
                        "emailAddresses": [{"email": "jane@acme.io"}],
                        "phoneNumbers": [
                            {"number": "+1 202 555 0100", "phoneType": "direct"},
                            {"number": "+1 202 555 0123", "phoneType": "mobile"}
                        ]
                    },
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let hit = adapter(&server)
            .invoke(&Contact::new("Jane", "Doe", "Acme"))
            .await
            .unwrap();
        assert_eq!(hit.email.as_deref(), Some("jane@acme.io"));
        assert_eq!(hit.phone.as_deref(), Some("+1 202 555 0123"));
        assert_eq!(hit.native_confidence, NativeConfidence::Found(true));
    }

    #[tokio::test]
    async fn empty_contact_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/person"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "contact": {"data": null, "error": {"code": 404, "name": "EMPTY_DATA"}}
            })))
            .mount(&server)
            .await;

        let hit = adapter(&server)
            .invoke(&Contact::new("Jane", "Doe", "Acme"))
            .await
            .unwrap();
        assert_eq!(hit, ProviderMatch::none());
    }

    #[tokio::test]
    async fn forbidden_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/person"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .invoke(&Contact::new("Jane", "Doe", "Acme"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
    }
}
