//! Credential resolution for a named connection.
//!
//! A [`CredentialResolver`] reads a connection's configuration once, then on
//! every call picks a credential source, builds credentials, optionally
//! narrows them to a delegate identity and hands out authorized clients.
//! Nothing is cached between calls.

use std::sync::Arc;

use reqwest::blocking::Client;

use crate::auth::{
    AmbientCredentialSource, Credentials, DefaultCredentialsChain, ServiceAccountKey,
    TokenProvider,
};
use crate::connection::{ConnectionConfig, ConnectionRegistry, CredentialSource, DEFAULT_CONN_ID};
use crate::credential_file::provide_gcp_credential_file;
use crate::error::Result;
use crate::http::{AuthorizedClient, default_user_agent};
use crate::project::{CallArgs, ProjectScoped};

/// Builds credentials and authorized clients for one connection.
#[derive(Clone)]
pub struct CredentialResolver {
    conn_id: String,
    delegate_to: Option<String>,
    config: ConnectionConfig,
    ambient: Arc<dyn AmbientCredentialSource>,
    http: Client,
    user_agent: String,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("conn_id", &self.conn_id)
            .field("delegate_to", &self.delegate_to)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// `CredentialResolver` builder
#[derive(Default)]
pub struct CredentialResolverBuilder {
    conn_id: Option<String>,
    delegate_to: Option<String>,
    ambient: Option<Arc<dyn AmbientCredentialSource>>,
    http: Option<Client>,
    user_agent: Option<String>,
}

impl CredentialResolverBuilder {
    /// Set the connection id (defaults to `google_cloud_default`)
    pub fn conn_id<S: Into<String>>(mut self, conn_id: S) -> Self {
        self.conn_id = Some(conn_id.into());
        self
    }

    /// Impersonate this account (requires domain-wide delegation)
    pub fn delegate_to<S: Into<String>>(mut self, delegate_to: S) -> Self {
        self.delegate_to = Some(delegate_to.into());
        self
    }

    /// Set the ambient credential source used when the connection has no key
    pub fn ambient_credentials(mut self, ambient: Arc<dyn AmbientCredentialSource>) -> Self {
        self.ambient = Some(ambient);
        self
    }

    /// Set the HTTP client shared by token exchanges and authorized clients
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Override the `User-Agent` product string
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Load the connection from `registry` and build the resolver.
    pub fn build(self, registry: &dyn ConnectionRegistry) -> Result<CredentialResolver> {
        let conn_id = self
            .conn_id
            .clone()
            .unwrap_or_else(|| DEFAULT_CONN_ID.to_string());
        let config = registry.connection(&conn_id)?;
        Ok(self.build_with_config(config))
    }

    /// Build the resolver around an already loaded configuration.
    pub fn build_with_config(self, config: ConnectionConfig) -> CredentialResolver {
        let http = self.http.unwrap_or_default();
        let ambient: Arc<dyn AmbientCredentialSource> = match self.ambient {
            Some(ambient) => ambient,
            None => Arc::new(DefaultCredentialsChain::new(http.clone())),
        };
        CredentialResolver {
            conn_id: self.conn_id.unwrap_or_else(|| DEFAULT_CONN_ID.to_string()),
            delegate_to: self.delegate_to,
            config,
            ambient,
            http,
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
        }
    }
}

impl CredentialResolver {
    pub fn builder() -> CredentialResolverBuilder {
        CredentialResolverBuilder::default()
    }

    /// Resolver for `conn_id` with the default ambient chain and HTTP client.
    pub fn new(
        registry: &dyn ConnectionRegistry,
        conn_id: impl Into<String>,
        delegate_to: Option<String>,
    ) -> Result<Self> {
        let mut builder = Self::builder().conn_id(conn_id);
        if let Some(delegate) = delegate_to {
            builder = builder.delegate_to(delegate);
        }
        builder.build(registry)
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn delegate_to(&self) -> Option<&str> {
        self.delegate_to.as_deref()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Resolve the credentials of this connection.
    pub fn resolve_credentials(&self) -> Result<Credentials> {
        let scopes = self.config.scopes();
        if self.config.key_path().is_some() && self.config.keyfile_dict().is_some() {
            tracing::debug!(target: "gcp_base_hook::auth", conn_id = %self.conn_id, "both key_path and keyfile_dict are set, using key_path");
        }

        let credentials = match self.config.credential_source()? {
            CredentialSource::Default => {
                tracing::info!(target: "gcp_base_hook::auth", conn_id = %self.conn_id, "Getting connection using default credentials since no key file is defined for hook.");
                self.ambient.discover(&scopes)?
            }
            CredentialSource::KeyFile(path) => {
                tracing::debug!(target: "gcp_base_hook::auth", conn_id = %self.conn_id, path = %path.display(), "Getting connection using JSON key file");
                let key = ServiceAccountKey::from_file(&path)?;
                Credentials::service_account(key, scopes, self.http.clone())
            }
            CredentialSource::KeyData(data) => {
                tracing::debug!(target: "gcp_base_hook::auth", conn_id = %self.conn_id, "Getting connection using JSON key data from the connection");
                let key = ServiceAccountKey::from_keyfile_dict(&data)?;
                Credentials::service_account(key, scopes, self.http.clone())
            }
        };

        match &self.delegate_to {
            Some(subject) => credentials.with_subject(subject.clone()),
            None => Ok(credentials),
        }
    }

    /// Resolve credentials and obtain a bearer token from them.
    pub fn access_token(&self) -> Result<String> {
        self.resolve_credentials()?.token()
    }

    /// Resolve credentials and wrap the HTTP client with them.
    ///
    /// No network I/O happens here; tokens are fetched when requests are sent.
    pub fn authorized_client(&self) -> Result<AuthorizedClient> {
        let credentials = self.resolve_credentials()?;
        Ok(AuthorizedClient::with_credentials(
            self.http.clone(),
            Arc::new(credentials),
            self.user_agent.clone(),
        ))
    }

    /// Field of the connection, or `default` when unset.
    pub fn field<'a>(&'a self, name: &str, default: Option<&'a str>) -> Option<&'a str> {
        self.config.field(name).or(default)
    }

    /// Default project of the connection.
    pub fn project_id(&self) -> Option<&str> {
        self.field("project", None)
    }

    /// Run `op` with the project id defaulted from the connection.
    pub fn with_default_project<P, T, F>(&self, params: P, op: F) -> Result<T>
    where
        P: ProjectScoped,
        F: FnOnce(P) -> Result<T>,
    {
        crate::project::fallback_to_default_project_id(self.project_id(), params, op)
    }

    /// Dynamic-argument variant of [`Self::with_default_project`].
    pub fn with_default_project_args<T, F>(&self, args: CallArgs, op: F) -> Result<T>
    where
        F: FnOnce(CallArgs) -> Result<T>,
    {
        crate::project::fallback_to_default_project_id_args(self.project_id(), args, op)
    }

    /// Run `op` with `GOOGLE_APPLICATION_CREDENTIALS` pointing at this connection's key.
    pub fn with_credential_file<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        provide_gcp_credential_file(&self.config, op)
    }
}
