use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use url::Url;
use uuid::Uuid;

use crate::csrf::CsrfSigner;

pub mod client;
pub mod handlers;

use client::AuthClient;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Build the application router.
///
/// Kept separate from [`new`] so tests can drive the exact same routes and
/// layers without binding a socket.
pub fn router(client: Arc<AuthClient>, signer: Arc<CsrfSigner>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/registration",
            get(handlers::registration::new_flow).post(handlers::registration::submit_flow),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Uuid::new_v4().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(client))
                .layer(Extension(signer)),
        )
}

/// Start the server
///
/// # Errors
///
/// Returns an error if the auth API client cannot be built or the listener
/// cannot bind.
pub async fn new(port: u16, auth_api_url: Url, signer: CsrfSigner) -> Result<()> {
    let client = Arc::new(AuthClient::new(auth_api_url)?);

    let app = router(client, Arc::new(signer));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{port}");

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
