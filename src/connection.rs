//! Connection configuration and registries
//!
//! A connection holds the per-connection settings used to authenticate:
//! an optional key file path, optional inline key JSON, an optional scope
//! list and an optional default project. Registries look connections up by id.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::parse_scopes;
use crate::error::{HookError, Result};

/// Prefix the workflow UI puts in front of custom connection fields.
pub const EXTRAS_PREFIX: &str = "extra__google_cloud_platform__";

/// Connection id used when none is given.
pub const DEFAULT_CONN_ID: &str = "google_cloud_default";

/// Settings of one Google Cloud connection.
///
/// Empty strings are treated the same as absent fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Path to a service account key file on disk.
    #[serde(default)]
    pub key_path: Option<String>,
    /// Inline service account key JSON.
    #[serde(default)]
    pub keyfile_dict: Option<String>,
    /// Comma separated OAuth scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Default project id.
    #[serde(default)]
    pub project: Option<String>,
}

/// Where the credentials of a connection come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Ambient credentials (environment key file or metadata server).
    Default,
    /// JSON service account key file on disk.
    KeyFile(PathBuf),
    /// Inline JSON service account key.
    KeyData(String),
}

impl ConnectionConfig {
    /// Build a config from a framework extras mapping.
    ///
    /// Each field is read from `extra__google_cloud_platform__<field>` first,
    /// then from the bare `<field>` key. Non-string values are kept as JSON text.
    pub fn from_extras(extras: &Map<String, Value>) -> Self {
        let lookup = |name: &str| -> Option<String> {
            extras
                .get(&format!("{EXTRAS_PREFIX}{name}"))
                .and_then(value_to_string)
                .filter(|v| !v.is_empty())
                .or_else(|| extras.get(name).and_then(value_to_string))
        };
        Self {
            key_path: lookup("key_path"),
            keyfile_dict: lookup("keyfile_dict"),
            scope: lookup("scope"),
            project: lookup("project"),
        }
    }

    pub fn key_path(&self) -> Option<&str> {
        non_empty(&self.key_path)
    }

    pub fn keyfile_dict(&self) -> Option<&str> {
        non_empty(&self.keyfile_dict)
    }

    pub fn scope(&self) -> Option<&str> {
        non_empty(&self.scope)
    }

    pub fn project(&self) -> Option<&str> {
        non_empty(&self.project)
    }

    /// Look a field up by name, accepting the UI-namespaced spelling too.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name.strip_prefix(EXTRAS_PREFIX).unwrap_or(name) {
            "key_path" => self.key_path(),
            "keyfile_dict" => self.keyfile_dict(),
            "scope" => self.scope(),
            "project" => self.project(),
            _ => None,
        }
    }

    /// Scopes requested by this connection, or the default cloud-platform scope.
    pub fn scopes(&self) -> Vec<String> {
        parse_scopes(self.scope())
    }

    /// Select the credential source.
    ///
    /// `key_path` takes precedence over `keyfile_dict` when both are set.
    pub fn credential_source(&self) -> Result<CredentialSource> {
        match (self.key_path(), self.keyfile_dict()) {
            (None, None) => Ok(CredentialSource::Default),
            (Some(path), _) => {
                if path.ends_with(".json") {
                    Ok(CredentialSource::KeyFile(PathBuf::from(path)))
                } else if path.ends_with(".p12") {
                    Err(HookError::UnsupportedKeyFormat)
                } else {
                    Err(HookError::UnrecognizedKeyFileExtension(path.to_string()))
                }
            }
            (None, Some(data)) => Ok(CredentialSource::KeyData(data.to_string())),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Source of connection configurations.
pub trait ConnectionRegistry: Send + Sync {
    /// Return the configuration of `conn_id`.
    fn connection(&self, conn_id: &str) -> Result<ConnectionConfig>;
}

/// Map-backed registry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnections {
    connections: HashMap<String, ConnectionConfig>,
}

impl InMemoryConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a connection.
    pub fn with_connection(mut self, conn_id: impl Into<String>, config: ConnectionConfig) -> Self {
        self.insert(conn_id, config);
        self
    }

    pub fn insert(&mut self, conn_id: impl Into<String>, config: ConnectionConfig) {
        self.connections.insert(conn_id.into(), config);
    }
}

impl ConnectionRegistry for InMemoryConnections {
    fn connection(&self, conn_id: &str) -> Result<ConnectionConfig> {
        self.connections
            .get(conn_id)
            .cloned()
            .ok_or_else(|| HookError::ConnectionNotFound(conn_id.to_string()))
    }
}

/// Registry reading `AIRFLOW_CONN_<CONN_ID>` environment variables.
///
/// The variable holds a JSON connection document whose `extra` member is
/// either an object or a JSON-encoded string:
///
/// ```text
/// AIRFLOW_CONN_GOOGLE_CLOUD_DEFAULT='{"conn_type": "google_cloud_platform",
///     "extra": {"extra__google_cloud_platform__project": "my-project"}}'
/// ```
#[derive(Debug, Clone)]
pub struct EnvConnections {
    prefix: String,
}

impl Default for EnvConnections {
    fn default() -> Self {
        Self {
            prefix: "AIRFLOW_CONN_".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConnectionDocument {
    #[serde(default)]
    extra: Option<Value>,
}

impl EnvConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different variable prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn variable_name(&self, conn_id: &str) -> String {
        format!("{}{}", self.prefix, conn_id.to_uppercase())
    }

    /// Parse a connection document as stored in the environment.
    pub fn parse_document(conn_id: &str, raw: &str) -> Result<ConnectionConfig> {
        let doc: ConnectionDocument = serde_json::from_str(raw).map_err(|e| {
            HookError::ConfigurationError(format!("connection {conn_id} is not valid JSON: {e}"))
        })?;
        let extras = match doc.extra {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(Value::String(s)) if s.is_empty() => Map::new(),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(map)) => map,
                _ => {
                    return Err(HookError::ConfigurationError(format!(
                        "extra of connection {conn_id} is not a JSON object"
                    )));
                }
            },
            Some(_) => {
                return Err(HookError::ConfigurationError(format!(
                    "extra of connection {conn_id} is not a JSON object"
                )));
            }
        };
        Ok(ConnectionConfig::from_extras(&extras))
    }
}

impl ConnectionRegistry for EnvConnections {
    fn connection(&self, conn_id: &str) -> Result<ConnectionConfig> {
        let name = self.variable_name(conn_id);
        let raw = std::env::var(&name)
            .map_err(|_| HookError::ConnectionNotFound(conn_id.to_string()))?;
        tracing::debug!(target: "gcp_base_hook::connection", conn_id, variable = %name, "loaded connection from environment");
        Self::parse_document(conn_id, &raw)
    }
}
