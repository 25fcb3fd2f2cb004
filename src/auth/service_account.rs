//! Service Account keys and the OAuth 2.0 JWT Bearer grant.
//!
//! A service account key signs a short-lived JWT assertion which is exchanged
//! at Google's token endpoint for an access token. Nothing is cached: each
//! exchange signs and posts a new assertion.

use std::path::Path;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HookError, Result};

/// Default Google OAuth token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime requested for each assertion, in seconds.
const ASSERTION_LIFETIME: i64 = 3600;

#[derive(Deserialize)]
struct RawServiceAccountKey {
    #[serde(rename = "type", default)]
    key_type: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    private_key: String,
    client_email: String,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

/// Parsed service account key (the JSON document downloaded from the console).
#[derive(Debug)]
pub struct ServiceAccountKey {
    pub key_type: Option<String>,
    pub project_id: Option<String>,
    pub private_key_id: Option<String>,
    pub client_email: String,
    pub client_id: Option<String>,
    pub token_uri: Option<String>,
    private_key: SecretString,
}

impl Clone for ServiceAccountKey {
    fn clone(&self) -> Self {
        Self {
            key_type: self.key_type.clone(),
            project_id: self.project_id.clone(),
            private_key_id: self.private_key_id.clone(),
            client_email: self.client_email.clone(),
            client_id: self.client_id.clone(),
            token_uri: self.token_uri.clone(),
            private_key: SecretString::from(self.private_key.expose_secret().to_owned()),
        }
    }
}

impl ServiceAccountKey {
    /// Create from raw fields.
    pub fn new(client_email: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            key_type: Some("service_account".to_string()),
            project_id: None,
            private_key_id: None,
            client_email: client_email.into(),
            client_id: None,
            token_uri: None,
            private_key: SecretString::from(private_key.into()),
        }
    }

    /// Override the token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = Some(token_uri.into());
        self
    }

    /// Parse a key document exactly as stored on disk.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| HookError::InvalidKeyJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse inline key data submitted through a connection form.
    ///
    /// Two-character `\n` sequences in `private_key` are turned into newlines.
    pub fn from_keyfile_dict(json: &str) -> Result<Self> {
        let mut value: Value =
            serde_json::from_str(json).map_err(|e| HookError::InvalidKeyJson(e.to_string()))?;
        if let Some(Value::String(key)) = value.get_mut("private_key") {
            *key = key.replace("\\n", "\n");
        }
        Self::from_value(value)
    }

    /// Load a key file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| HookError::KeyFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    fn from_value(value: Value) -> Result<Self> {
        let raw: RawServiceAccountKey = serde_json::from_value(value)
            .map_err(|e| HookError::MalformedServiceAccount(e.to_string()))?;
        Ok(Self {
            key_type: raw.key_type,
            project_id: raw.project_id,
            private_key_id: raw.private_key_id,
            client_email: raw.client_email,
            client_id: raw.client_id,
            token_uri: raw.token_uri,
            private_key: SecretString::from(raw.private_key),
        })
    }

    /// PEM private key.
    pub fn private_key(&self) -> &SecretString {
        &self.private_key
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    /// Sign a JWT assertion for `scopes`, optionally on behalf of `subject`.
    pub fn sign_assertion(&self, scopes: &[String], subject: Option<&str>) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: self.client_email.clone(),
            scope: scopes.join(" "),
            aud: self.token_uri().to_string(),
            iat: now,
            exp: now + ASSERTION_LIFETIME,
            sub: subject.map(str::to_string),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = self.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(|e| HookError::TokenSigning(format!("invalid RSA private key (PEM): {e}")))?;
        encode(&header, &claims, &key).map_err(|e| HookError::TokenSigning(e.to_string()))
    }

    /// Exchange a freshly signed assertion for an access token.
    pub fn fetch_token(
        &self,
        http: &Client,
        scopes: &[String],
        subject: Option<&str>,
    ) -> Result<String> {
        let assertion = self.sign_assertion(scopes, subject)?;
        let form = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ];

        tracing::debug!(target: "gcp_base_hook::auth", client_email = %self.client_email, token_uri = %self.token_uri(), "exchanging service account assertion");
        let resp = http
            .post(self.token_uri())
            .form(&form)
            .send()
            .map_err(|e| HookError::HttpError(format!("Token endpoint request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(HookError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let tr: TokenResponse = resp
            .json()
            .map_err(|e| HookError::ParseError(format!("Failed to parse token response: {e}")))?;
        Ok(tr.access_token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sub: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
}
