//! Authorized HTTP client
//!
//! An [`AuthorizedClient`] wraps a blocking `reqwest` client with an ordered
//! chain of [`RequestInterceptor`]s. Interceptors never mutate the caller's
//! headers: each one receives the current map by reference and returns a new
//! one.

use std::sync::Arc;

use reqwest::Method;
use reqwest::blocking::{Body, Client, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};

use crate::auth::TokenProvider;
use crate::error::{HookError, Result};

/// Product name sent in the `User-Agent` header.
pub const USER_AGENT_PRODUCT: &str = "airflow";

/// `airflow-<version>`, the default user-agent string.
pub fn default_user_agent() -> String {
    format!("{USER_AGENT_PRODUCT}-{}", env!("CARGO_PKG_VERSION"))
}

/// Hook applied to the headers of every outgoing request.
pub trait RequestInterceptor: Send + Sync {
    /// Return the headers to send, derived from `headers`.
    fn on_before_send(&self, headers: &HeaderMap) -> Result<HeaderMap>;
}

/// Sets the product/version user-agent, prepending it to any caller-supplied value.
#[derive(Debug, Clone)]
pub struct UserAgentInterceptor {
    user_agent: String,
}

impl UserAgentInterceptor {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl RequestInterceptor for UserAgentInterceptor {
    fn on_before_send(&self, headers: &HeaderMap) -> Result<HeaderMap> {
        let mut new_headers = headers.clone();
        // Caller values may carry obs-text, so join as bytes.
        let mut value = self.user_agent.as_bytes().to_vec();
        if let Some(existing) = headers.get(USER_AGENT) {
            value.push(b' ');
            value.extend_from_slice(existing.as_bytes());
        }
        let value = HeaderValue::from_bytes(&value)
            .map_err(|e| HookError::InvalidHeader(format!("user-agent: {e}")))?;
        new_headers.insert(USER_AGENT, value);
        Ok(new_headers)
    }
}

/// Injects `Authorization: Bearer <token>`, fetching the token at send time.
#[derive(Clone)]
pub struct BearerTokenInterceptor {
    provider: Arc<dyn TokenProvider>,
}

impl BearerTokenInterceptor {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

impl RequestInterceptor for BearerTokenInterceptor {
    fn on_before_send(&self, headers: &HeaderMap) -> Result<HeaderMap> {
        let token = self.provider.token()?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| HookError::InvalidHeader(format!("authorization: {e}")))?;
        value.set_sensitive(true);
        let mut new_headers = headers.clone();
        new_headers.insert(AUTHORIZATION, value);
        Ok(new_headers)
    }
}

/// HTTP client that decorates every request with credentials and a user-agent.
#[derive(Clone)]
pub struct AuthorizedClient {
    http: Client,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl AuthorizedClient {
    /// Wrap `http` with interceptors applied in order.
    pub fn new(http: Client, interceptors: Vec<Arc<dyn RequestInterceptor>>) -> Self {
        Self { http, interceptors }
    }

    /// Standard decoration: bearer token from `provider`, then `user_agent`.
    pub fn with_credentials(
        http: Client,
        provider: Arc<dyn TokenProvider>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self::new(
            http,
            vec![
                Arc::new(BearerTokenInterceptor::new(provider)),
                Arc::new(UserAgentInterceptor::new(user_agent)),
            ],
        )
    }

    /// Headers that would be sent for a request carrying `headers`.
    pub fn prepare_headers(&self, headers: &HeaderMap) -> Result<HeaderMap> {
        let mut current = headers.clone();
        for interceptor in &self.interceptors {
            current = interceptor.on_before_send(&current)?;
        }
        Ok(current)
    }

    /// Send a request. `headers` is left untouched.
    pub fn request(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<Body>,
    ) -> Result<Response> {
        let prepared = self.prepare_headers(headers)?;
        tracing::debug!(target: "gcp_base_hook::http", method = %method, url = %url, "sending request");
        let mut builder = self.http.request(method, url).headers(prepared);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let resp = builder.send().inspect_err(|e| {
            tracing::debug!(target: "gcp_base_hook::http", url = %url, err = %e, "request error");
        })?;
        tracing::debug!(target: "gcp_base_hook::http", url = %url, status = %resp.status().as_u16(), "response received");
        Ok(resp)
    }

    pub fn get(&self, url: &str, headers: &HeaderMap) -> Result<Response> {
        self.request(Method::GET, url, headers, None)
    }

    pub fn post(&self, url: &str, headers: &HeaderMap, body: impl Into<Body>) -> Result<Response> {
        self.request(Method::POST, url, headers, Some(body.into()))
    }

    /// The undecorated client.
    pub fn inner(&self) -> &Client {
        &self.http
    }
}
