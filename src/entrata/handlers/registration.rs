//! Registration flow pages.
//!
//! `GET /registration` asks the auth API for a fresh registration flow,
//! binds a CSRF token to the `session_id` cookie the auth API sets, and
//! renders the form. `POST /registration` verifies the returned token
//! against the session cookie before anything else is looked at.

use axum::{
    extract::Extension,
    http::{
        header::{SET_COOKIE, USER_AGENT},
        HeaderMap, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use super::{session_from_request, valid_email, valid_password};
use crate::cookie::SESSION_COOKIE_NAME;
use crate::csrf::CsrfSigner;
use crate::entrata::client::{AuthClient, CompleteRegistrationFlowRequest, RegistrationFlow};

#[derive(Deserialize)]
pub struct RegistrationForm {
    #[serde(rename = "flow-name")]
    pub flow_name: String,
    #[serde(rename = "flow-etag")]
    pub flow_etag: String,
    #[serde(rename = "csrf-token")]
    pub csrf_token: String,
    pub email: String,
    pub password: String,
}

// axum handler for the registration page
#[instrument(skip_all)]
pub async fn new_flow(
    headers: HeaderMap,
    Extension(client): Extension<Arc<AuthClient>>,
    Extension(signer): Extension<Arc<CsrfSigner>>,
) -> Response {
    let user_agent = headers.get(USER_AGENT).and_then(|value| value.to_str().ok());

    let (flow_response, upstream_headers) = match client
        .create_registration_flow(user_agent, "0.0.0.0")
        .await
    {
        Ok(created) => created,
        Err(err) => {
            error!("Failed to create registration flow: {err:?}");
            return error_page().into_response();
        }
    };

    let Some(flow) = flow_response.registration_flow else {
        error!("Auth API response is missing the registration flow");
        return error_page().into_response();
    };

    let csrf_token = match signer.issue_from_set_cookie_headers(&upstream_headers) {
        Ok(Some(token)) => token.as_str().to_string(),
        Ok(None) => {
            // Form still renders; verification of any submission fails closed.
            warn!("No {SESSION_COOKIE_NAME} cookie in the auth API response, omitting CSRF token");
            String::new()
        }
        Err(err) => {
            error!("Failed to issue CSRF token: {err}");
            return error_page().into_response();
        }
    };

    // Forward the session cookie to the browser; the rest of the upstream
    // headers stay behind.
    let mut response_headers = HeaderMap::new();
    for value in upstream_headers.get_all(SET_COOKIE) {
        response_headers.append(SET_COOKIE, value.clone());
    }

    (
        response_headers,
        Html(registration_page(&flow, &csrf_token)),
    )
        .into_response()
}

// axum handler for the registration form submission
#[instrument(skip_all)]
pub async fn submit_flow(
    headers: HeaderMap,
    Extension(client): Extension<Arc<AuthClient>>,
    Extension(signer): Extension<Arc<CsrfSigner>>,
    Form(form): Form<RegistrationForm>,
) -> Response {
    let Some(session_id) = session_from_request(&headers) else {
        debug!("Registration submission without a session cookie");
        return (StatusCode::FORBIDDEN, "Invalid CSRF token".to_string()).into_response();
    };

    if !signer.verify(session_id, &form.csrf_token) {
        warn!("Rejected CSRF token for registration flow");
        return (StatusCode::FORBIDDEN, "Invalid CSRF token".to_string()).into_response();
    }

    if !valid_email(&form.email) {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Invalid email".to_string()).into_response();
    }

    if !valid_password(&form.password) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid password digest".to_string(),
        )
            .into_response();
    }

    let request = CompleteRegistrationFlowRequest {
        name: &form.flow_name,
        etag: &form.flow_etag,
        email: &form.email,
        password: &form.password,
    };

    let session_cookie = format!("{SESSION_COOKIE_NAME}={session_id}");

    match client
        .complete_registration_flow(&session_cookie, &request)
        .await
    {
        Ok(()) => (StatusCode::CREATED, Html(COMPLETED_PAGE.to_string())).into_response(),
        Err(err) => {
            error!("Failed to complete registration flow: {err:?}");
            error_page().into_response()
        }
    }
}

const COMPLETED_PAGE: &str = "<!doctype html>\n<html>\n<head><title>Account created</title></head>\n\
<body>\n<h1>Account created</h1>\n<p>Check your inbox to verify your email address.</p>\n\
</body>\n</html>\n";

fn registration_page(flow: &RegistrationFlow, csrf_token: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head><title>Create an Account</title></head>\n<body>\n\
<h1>Create an Account</h1>\n\
<form method=\"post\" action=\"/registration\">\n\
<input type=\"hidden\" name=\"flow-name\" value=\"{}\">\n\
<input type=\"hidden\" name=\"flow-etag\" value=\"{}\">\n\
<input type=\"hidden\" name=\"csrf-token\" value=\"{}\">\n\
<label>Email <input type=\"email\" name=\"email\" required></label>\n\
<label>Password <input type=\"password\" name=\"password\" required></label>\n\
<button type=\"submit\">Sign up</button>\n\
</form>\n</body>\n</html>\n",
        escape_attribute(&flow.name),
        escape_attribute(&flow.etag),
        escape_attribute(csrf_token),
    )
}

fn error_page() -> (StatusCode, Html<String>) {
    (
        StatusCode::BAD_GATEWAY,
        Html(
            "<!doctype html>\n<html>\n<head><title>Something went wrong</title></head>\n\
<body>\n<h1>Uh oh! Something went wrong.</h1>\n\
<p>There was a problem with your request. Please try again later.</p>\n\
</body>\n</html>\n"
                .to_string(),
        ),
    )
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> RegistrationFlow {
        RegistrationFlow {
            name: "registrationFlows/01923634-d98c-9563-8c9e-3a676d49ac00".to_string(),
            flow_id: "01923634-d98c-9563-8c9e-3a676d49ac00".to_string(),
            etag: "UWu5u//dU1PuukmRaEmO1RUNSN5NkUgXV/3gpUhMHow=.MDAx".to_string(),
        }
    }

    #[test]
    fn test_registration_page_embeds_hidden_fields() {
        let page = registration_page(&flow(), "digest.message");

        assert!(page.contains(
            "name=\"flow-name\" value=\"registrationFlows/01923634-d98c-9563-8c9e-3a676d49ac00\""
        ));
        assert!(page.contains("name=\"flow-etag\""));
        assert!(page.contains("name=\"csrf-token\" value=\"digest.message\""));
    }

    #[test]
    fn test_registration_page_escapes_values() {
        let mut flow = flow();
        flow.name = "\"><script>".to_string();

        let page = registration_page(&flow, "");

        assert!(!page.contains("\"><script>"));
        assert!(page.contains("&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn test_registration_page_with_empty_token() {
        let page = registration_page(&flow(), "");
        assert!(page.contains("name=\"csrf-token\" value=\"\""));
    }
}
