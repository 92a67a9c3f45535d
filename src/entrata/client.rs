//! HTTP client for the auth API registration endpoints. Centralizes headers
//! and response-header hygiene so route handlers never see upstream
//! internals they should not forward.

use anyhow::{ensure, Context, Result};
use axum::http::{
    header::{COOKIE, USER_AGENT},
    HeaderMap,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::entrata::APP_USER_AGENT;

/// Upstream response headers that are never forwarded to the browser.
const STRIPPED_HEADERS: &[&str] = &[
    "content-length",
    "content-type",
    "date",
    "server",
    "transfer-encoding",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFlow {
    pub name: String,
    pub flow_id: String,
    pub etag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistrationFlowResponse {
    pub registration_flow: Option<RegistrationFlow>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRegistrationFlowRequest<'a> {
    pub name: &'a str,
    pub etag: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: Url,
    client: Client,
}

impl AuthClient {
    /// Create a client for the auth API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to create auth API client")?;

        Ok(Self { base_url, client })
    }

    /// Create a registration flow.
    ///
    /// Returns the decoded flow and the upstream response headers, already
    /// stripped of internals, so the caller can forward `Set-Cookie` to the
    /// browser.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures, non-success status codes, or
    /// an undecodable response body.
    pub async fn create_registration_flow(
        &self,
        user_agent: Option<&str>,
        forwarded_for: &str,
    ) -> Result<(CreateRegistrationFlowResponse, HeaderMap)> {
        let url = self.base_url.join("v1/registration/flow")?;

        let mut request = self
            .client
            .post(url)
            .header("X-Forwarded-For", forwarded_for);

        if let Some(user_agent) = user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach the auth API")?;

        let status = response.status();
        ensure!(
            status.is_success(),
            "Auth API returned {status} creating the registration flow"
        );

        let mut headers = response.headers().clone();
        strip_headers(&mut headers, STRIPPED_HEADERS);

        let flow = response
            .json::<CreateRegistrationFlowResponse>()
            .await
            .context("Failed to decode the registration flow response")?;

        Ok((flow, headers))
    }

    /// Complete a registration flow on behalf of the browser session.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures or non-success status codes.
    pub async fn complete_registration_flow(
        &self,
        session_cookie: &str,
        request: &CompleteRegistrationFlowRequest<'_>,
    ) -> Result<()> {
        let url = self.base_url.join("v1/registration/flow/complete")?;

        let response = self
            .client
            .post(url)
            .header(COOKIE, session_cookie)
            .json(request)
            .send()
            .await
            .context("Failed to reach the auth API")?;

        let status = response.status();
        ensure!(
            status.is_success(),
            "Auth API returned {status} completing the registration flow"
        );

        Ok(())
    }
}

/// Remove the named headers, leaving everything else untouched. Names that
/// are not present are ignored.
pub fn strip_headers(headers: &mut HeaderMap, names: &[&str]) {
    for name in names {
        headers.remove(*name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{DATE, SET_COOKIE};

    fn upstream_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            SET_COOKIE,
            "session_id=01923644-5726-3de2-f6d9-c90722cefdde; Path=/; HttpOnly"
                .parse()
                .unwrap(),
        );
        headers.insert(DATE, "Sat, 28 Sep 2024 01:35:01 GMT".parse().unwrap());
        headers
    }

    #[test]
    fn test_strip_headers() {
        let mut headers = upstream_headers();
        strip_headers(&mut headers, &["set-cookie"]);

        assert!(!headers.contains_key(SET_COOKIE));
        assert_eq!(
            headers.get(DATE).and_then(|value| value.to_str().ok()),
            Some("Sat, 28 Sep 2024 01:35:01 GMT")
        );
    }

    #[test]
    fn test_strip_headers_ignores_unknown_names() {
        let mut headers = upstream_headers();
        strip_headers(&mut headers, &["content-type"]);

        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key(SET_COOKIE));
    }

    #[test]
    fn test_create_registration_flow_response_decoding() {
        let body = r#"{
            "registrationFlow": {
                "name": "registrationFlows/01923634-d98c-9563-8c9e-3a676d49ac00",
                "flowId": "01923634-d98c-9563-8c9e-3a676d49ac00",
                "etag": "UWu5u//dU1PuukmRaEmO1RUNSN5NkUgXV/3gpUhMHow=.MDE5MjM2MzQtZDk4My05MjM1LTU2OWMtN2E1ZTc2NjcxOWUzIWJmMDFiODA3LWIwZTQtNDkxOS1hZGFiLTM5NTQzZDU5OTgwYg=="
            }
        }"#;

        let response: CreateRegistrationFlowResponse = serde_json::from_str(body).unwrap();
        let flow = response.registration_flow.unwrap();

        assert_eq!(
            flow.name,
            "registrationFlows/01923634-d98c-9563-8c9e-3a676d49ac00"
        );
        assert_eq!(flow.flow_id, "01923634-d98c-9563-8c9e-3a676d49ac00");
        assert!(flow.etag.contains('.'));
    }

    #[test]
    fn test_create_registration_flow_response_missing_flow() {
        let response: CreateRegistrationFlowResponse = serde_json::from_str("{}").unwrap();
        assert!(response.registration_flow.is_none());
    }
}
