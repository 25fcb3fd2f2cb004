//! Token-bearing credentials.

use std::fmt;

use reqwest::blocking::Client;
use serde::Deserialize;

use super::TokenProvider;
use super::service_account::ServiceAccountKey;
use crate::error::{HookError, Result};

const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR_VALUE: &str = "Google";
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Clone)]
enum Kind {
    ServiceAccount {
        key: ServiceAccountKey,
        subject: Option<String>,
        http: Client,
    },
    ComputeEngine {
        metadata_root: String,
        http: Client,
    },
    AccessToken(String),
}

/// Credentials resolved for one connection.
///
/// Tokens are obtained on demand through [`TokenProvider::token`] and never
/// cached.
#[derive(Clone)]
pub struct Credentials {
    kind: Kind,
    scopes: Vec<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind_name())
            .field("scopes", &self.scopes)
            .field("subject", &self.subject())
            .finish()
    }
}

impl Credentials {
    /// Service account credentials for `scopes`.
    pub fn service_account(key: ServiceAccountKey, scopes: Vec<String>, http: Client) -> Self {
        Self {
            kind: Kind::ServiceAccount {
                key,
                subject: None,
                http,
            },
            scopes,
        }
    }

    /// Identity of the VM the process runs on, served by the metadata server.
    pub fn compute_engine(
        metadata_root: impl Into<String>,
        scopes: Vec<String>,
        http: Client,
    ) -> Self {
        Self {
            kind: Kind::ComputeEngine {
                metadata_root: metadata_root.into().trim_end_matches('/').to_string(),
                http,
            },
            scopes,
        }
    }

    /// Wrap an access token managed outside this crate.
    pub fn from_access_token(token: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            kind: Kind::AccessToken(token.into()),
            scopes,
        }
    }

    /// Act on behalf of `subject` (domain-wide delegation).
    ///
    /// Only service account credentials can carry a subject.
    pub fn with_subject(self, subject: impl Into<String>) -> Result<Self> {
        match self.kind {
            Kind::ServiceAccount { key, http, .. } => Ok(Self {
                kind: Kind::ServiceAccount {
                    key,
                    subject: Some(subject.into()),
                    http,
                },
                scopes: self.scopes,
            }),
            _ => Err(HookError::ImpersonationUnsupported(self.kind_name())),
        }
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Identity these credentials act on behalf of, if narrowed.
    pub fn subject(&self) -> Option<&str> {
        match &self.kind {
            Kind::ServiceAccount { subject, .. } => subject.as_deref(),
            _ => None,
        }
    }

    pub fn service_account_key(&self) -> Option<&ServiceAccountKey> {
        match &self.kind {
            Kind::ServiceAccount { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            Kind::ServiceAccount { .. } => "service_account",
            Kind::ComputeEngine { .. } => "compute_engine",
            Kind::AccessToken(_) => "access_token",
        }
    }

    fn fetch_metadata_token(&self, http: &Client, metadata_root: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct MdResp {
            access_token: String,
        }

        let url = format!("{metadata_root}{METADATA_TOKEN_PATH}");
        let mut req = http
            .get(url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE);
        if !self.scopes.is_empty() {
            req = req.query(&[("scopes", self.scopes.join(","))]);
        }
        let resp = req
            .send()
            .map_err(|e| HookError::HttpError(format!("Metadata server request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(HookError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }
        let m: MdResp = resp.json().map_err(|e| {
            HookError::ParseError(format!("Failed to parse metadata token response: {e}"))
        })?;
        Ok(m.access_token)
    }
}

impl TokenProvider for Credentials {
    fn token(&self) -> Result<String> {
        match &self.kind {
            Kind::ServiceAccount { key, subject, http } => {
                key.fetch_token(http, &self.scopes, subject.as_deref())
            }
            Kind::ComputeEngine {
                metadata_root,
                http,
            } => self.fetch_metadata_token(http, metadata_root),
            Kind::AccessToken(token) => Ok(token.clone()),
        }
    }
}
