//! Test fixtures: service account keys, a recording ambient source and env guards

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gcp_base_hook::{AmbientCredentialSource, Credentials, Result};

/// RSA key generated for these tests only (do not use in production)
pub const TEST_RSA_PRIVATE_KEY: &str = include_str!("../fixtures/service_account_key.pem");

pub const TEST_CLIENT_EMAIL: &str = "svc@test-project.iam.gserviceaccount.com";

/// Service account key document, as downloaded from the console.
pub fn service_account_json(token_uri: Option<&str>) -> String {
    let mut doc = serde_json::json!({
        "type": "service_account",
        "project_id": "test-project",
        "private_key_id": "0123456789abcdef",
        "private_key": TEST_RSA_PRIVATE_KEY,
        "client_email": TEST_CLIENT_EMAIL,
        "client_id": "1234567890",
    });
    if let Some(uri) = token_uri {
        doc["token_uri"] = serde_json::Value::from(uri);
    }
    doc.to_string()
}

/// Same document with the private key newlines escaped twice, the way a
/// connection form may submit it.
pub fn ui_escaped_service_account_json(token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "private_key": TEST_RSA_PRIVATE_KEY.replace('\n', "\\n"),
        "client_email": TEST_CLIENT_EMAIL,
        "token_uri": token_uri,
    })
    .to_string()
}

/// Write `contents` to `name` inside `dir`.
pub fn write_key_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write key file");
    path
}

/// Decode the claims of a JWT without verifying it.
pub fn jwt_claims(jwt: &str) -> serde_json::Value {
    let payload = jwt.split('.').nth(1).expect("jwt payload");
    let bytes = URL_SAFE_NO_PAD.decode(payload).expect("base64 payload");
    serde_json::from_slice(&bytes).expect("json claims")
}

/// Ambient source returning a fixed token and recording requested scopes.
pub struct RecordingAmbient {
    token: String,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingAmbient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl AmbientCredentialSource for RecordingAmbient {
    fn discover(&self, scopes: &[String]) -> Result<Credentials> {
        self.calls.lock().unwrap().push(scopes.to_vec());
        Ok(Credentials::from_access_token(self.token.clone(), scopes.to_vec()))
    }
}

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that touch process environment variables.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct EnvGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &'static str, value: &str) -> Self {
        let previous = std::env::var(key).ok();
        unsafe {
            std::env::set_var(key, value);
        }
        Self { key, previous }
    }

    pub fn remove(key: &'static str) -> Self {
        let previous = std::env::var(key).ok();
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}
