//! Hunter email-finder adapter.
//!
//! `GET /v2/email-finder` with the key as a query parameter. The vendor's
//! `score` is a 0–100 probability that the address is correct.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use leadcascade_shared::{Contact, NativeConfidence};

use super::{
    ProviderAdapter, ProviderMatch, StatusCheck, check_status, clean, decode_json, endpoint,
    linkedin_handle, transport_error,
};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.hunter.io";

#[derive(Debug, Deserialize)]
struct HunterResponse {
    data: Option<HunterData>,
}

#[derive(Debug, Deserialize)]
struct HunterData {
    email: Option<String>,
    score: Option<f64>,
    phone_number: Option<String>,
}

/// Adapter for the Hunter email-finder API.
pub struct HunterAdapter {
    name: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl HunterAdapter {
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
impl ProviderAdapter for HunterAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(provider = %self.name))]
    async fn invoke(&self, contact: &Contact) -> Result<ProviderMatch, ProviderError> {
        let (first_name, last_name) = contact.name_parts();
        let mut query = vec![
            ("first_name", first_name),
            ("last_name", last_name),
            ("api_key", self.api_key.clone()),
        ];

        // Hunter needs one of domain, company or LinkedIn handle to search on
        if let Some(domain) = contact.domain() {
            query.push(("domain", domain));
        } else if let Some(company) = contact.company_name() {
            query.push(("company", company.to_string()));
        } else if let Some(handle) = linkedin_handle(contact.profile_url.as_deref()) {
            query.push(("linkedin_handle", handle));
        } else {
            debug!("no domain, company or profile to search on");
            return Ok(ProviderMatch::none());
        }

        let response = self
            .client
            .get(endpoint(&self.base_url, "/v2/email-finder"))
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, e))?;

        if let StatusCheck::NotFound = check_status(&self.name, response.status())? {
            return Ok(ProviderMatch::none());
        }

        let body: HunterResponse = decode_json(&self.name, response).await?;
        let Some(data) = body.data else {
            return Ok(ProviderMatch::none());
        };

        let email = clean(data.email.as_deref());
        let phone = clean(data.phone_number.as_deref());
        if email.is_none() && phone.is_none() {
            return Ok(ProviderMatch::none());
        }

        let native_confidence = match data.score {
            Some(score) => NativeConfidence::Probability(score),
            None => NativeConfidence::Found(true),
        };

        Ok(ProviderMatch {
            email,
            phone,
            native_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> HunterAdapter {
        let client = super::super::build_client(Duration::from_secs(5)).unwrap();
        HunterAdapter::new("hunter".into(), "test-key".into(), Some(server.uri()), client)
    }

    fn contact() -> Contact {
        Contact {
            company_domain: Some("acme.io".into()),
            ..Contact::new("Jane", "Doe", "Acme")
        }
    }

    #[tokio::test]
    async fn finds_email_with_score() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/email-finder"))
            .and(query_param("domain", "acme.io"))
            .and(query_param("first_name", "Jane"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"email": "jane.doe@acme.io", "score": 91, "phone_number": null}
            })))
            .mount(&server)
            .await;

        let hit = adapter(&server).invoke(&contact()).await.unwrap();
        assert_eq!(hit.email.as_deref(), Some("jane.doe@acme.io"));
        assert!(hit.phone.is_none());
        assert_eq!(hit.native_confidence, NativeConfidence::Probability(91.0));
    }

    #[tokio::test]
    async fn falls_back_to_company_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/email-finder"))
            .and(query_param("company", "Acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"email": null, "score": null}
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
    async fn unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/email-finder"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = adapter(&server).invoke(&contact()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/email-finder"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = adapter(&server).invoke(&contact()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn nothing_to_search_on_skips_request() {
        let server = MockServer::start().await;
        Mock::given(path("/v2/email-finder"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let bare = Contact {
            first_name: "Jane".into(),
            ..Default::default()
        };
        let hit = adapter(&server).invoke(&bare).await.unwrap();
        assert_eq!(hit, ProviderMatch::none());
    }
}
