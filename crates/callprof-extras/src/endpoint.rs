//! The report endpoint.

use crate::auth::BasicCredentials;
use crate::config::ProfilerConfig;
use crate::store::InMemoryAggregateStore;
use bytes::Bytes;
use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use std::sync::Arc;

/// Value of the `WWW-Authenticate` header sent with a 401.
pub const AUTHENTICATE_CHALLENGE: &str = "Basic realm=\"callprof\"";

/// Serves the aggregate snapshot as JSON, optionally behind basic auth.
///
/// Only `GET` on the configured path is answered; everything else is a
/// `404`. With basic auth enabled, any authentication failure is a `401`
/// with an empty body.
#[derive(Debug, Clone)]
pub struct ProfilerEndpoint {
    path: String,
    credentials: Option<BasicCredentials>,
    store: Arc<InMemoryAggregateStore>,
}

impl ProfilerEndpoint {
    /// Endpoint reporting from `store` with the path and credentials in
    /// `config`.
    pub fn new(config: &ProfilerConfig, store: Arc<InMemoryAggregateStore>) -> Self {
        let credentials = config
            .enable_basic
            .then(|| BasicCredentials::new(&config.username, &config.password));
        Self {
            path: config.endpoint_path.clone(),
            credentials,
            store,
        }
    }

    /// Path this endpoint answers on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether `request` is addressed to this endpoint.
    pub fn matches<B>(&self, request: &Request<B>) -> bool {
        request.uri().path() == self.path
    }

    /// Answer `request`.
    pub fn respond<B>(&self, request: &Request<B>) -> Response<Full<Bytes>> {
        if !self.matches(request) || request.method() != Method::GET {
            return empty(StatusCode::NOT_FOUND);
        }

        if let Some(credentials) = &self.credentials {
            if let Err(error) = credentials.verify(request.headers()) {
                tracing::debug!(%error, "profiler endpoint rejected request");
                let mut response = empty(StatusCode::UNAUTHORIZED);
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(AUTHENTICATE_CHALLENGE),
                );
                return response;
            }
        }

        match serde_json::to_vec(&self.store.snapshot()) {
            Ok(body) => {
                let mut response = Response::new(Full::new(Bytes::from(body)));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
            Err(error) => {
                tracing::error!(%error, "failed to serialize profiler snapshot");
                empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
