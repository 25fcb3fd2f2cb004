//! Application Default Credentials (ADC) discovery for Google Cloud.
//!
//! Resolution order:
//! 1) Service Account JSON via `GOOGLE_APPLICATION_CREDENTIALS`
//! 2) GCE/GKE metadata server identity
//!
//! Discovery does not fetch a token; it only decides where tokens will come from.

use std::time::Duration;

use reqwest::blocking::Client;

use super::credentials::Credentials;
use super::service_account::ServiceAccountKey;
use crate::error::{HookError, Result};

/// Environment variable pointing at a service account key file.
pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Environment variable overriding the metadata server host.
pub const GCE_METADATA_HOST: &str = "GCE_METADATA_HOST";

const METADATA_HOST_DEFAULT: &str = "metadata.google.internal";
const METADATA_HEADER: &str = "Metadata-Flavor";
const METADATA_HEADER_VALUE: &str = "Google";
const METADATA_PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Platform mechanism producing credentials when a connection has no key material.
pub trait AmbientCredentialSource: Send + Sync {
    /// Discover credentials valid for `scopes`.
    fn discover(&self, scopes: &[String]) -> Result<Credentials>;
}

/// Default ADC chain: environment key file, then metadata server.
#[derive(Debug, Clone)]
pub struct DefaultCredentialsChain {
    http: Client,
    metadata_root: Option<String>,
}

impl DefaultCredentialsChain {
    /// Create a new chain with a custom HTTP client
    pub fn new(http: Client) -> Self {
        Self {
            http,
            metadata_root: None,
        }
    }

    /// Create a new chain with default HTTP client
    pub fn default_client() -> Self {
        Self::new(Client::new())
    }

    /// Use an explicit metadata server root URL (e.g. `http://127.0.0.1:8080`).
    pub fn with_metadata_root(mut self, root: impl Into<String>) -> Self {
        self.metadata_root = Some(root.into());
        self
    }

    fn metadata_root(&self) -> String {
        if let Some(root) = &self.metadata_root {
            return root.trim_end_matches('/').to_string();
        }
        let host = std::env::var(GCE_METADATA_HOST)
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| METADATA_HOST_DEFAULT.to_string());
        format!("http://{host}")
    }

    fn try_key_file(&self, scopes: &[String]) -> Result<Option<Credentials>> {
        let path = match std::env::var(GOOGLE_APPLICATION_CREDENTIALS) {
            Ok(path) if !path.is_empty() => path,
            _ => return Ok(None),
        };
        tracing::debug!(target: "gcp_base_hook::auth", path = %path, "loading ambient credentials from {GOOGLE_APPLICATION_CREDENTIALS}");
        let key = ServiceAccountKey::from_file(&path)?;
        Ok(Some(Credentials::service_account(
            key,
            scopes.to_vec(),
            self.http.clone(),
        )))
    }

    fn try_metadata(&self, scopes: &[String]) -> Result<Option<Credentials>> {
        let root = self.metadata_root();
        let resp = match self
            .http
            .get(format!("{root}/"))
            .header(METADATA_HEADER, METADATA_HEADER_VALUE)
            .timeout(METADATA_PING_TIMEOUT)
            .send()
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(target: "gcp_base_hook::auth", root = %root, err = %e, "metadata server unreachable");
                return Ok(None);
            }
        };
        let flavor_ok = resp
            .headers()
            .get(METADATA_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == METADATA_HEADER_VALUE);
        if !resp.status().is_success() || !flavor_ok {
            tracing::debug!(target: "gcp_base_hook::auth", root = %root, status = %resp.status().as_u16(), "metadata server did not identify itself");
            return Ok(None);
        }
        Ok(Some(Credentials::compute_engine(
            root,
            scopes.to_vec(),
            self.http.clone(),
        )))
    }
}

impl AmbientCredentialSource for DefaultCredentialsChain {
    fn discover(&self, scopes: &[String]) -> Result<Credentials> {
        if let Some(creds) = self.try_key_file(scopes)? {
            return Ok(creds);
        }
        if let Some(creds) = self.try_metadata(scopes)? {
            return Ok(creds);
        }
        Err(HookError::AmbientCredentialsUnavailable(format!(
            "{GOOGLE_APPLICATION_CREDENTIALS} is not set and no metadata server answered"
        )))
    }
}
