//! # gcp-base-hook
//!
//! Credential resolution for Google Cloud workflow connections.
//!
//! A connection may authenticate in one of three ways:
//!
//! - **Default credentials**: no key configured. The service account key named
//!   by `GOOGLE_APPLICATION_CREDENTIALS` or the metadata server identity is used.
//! - **JSON key file**: `key_path` points at a service account key on disk.
//!   Legacy P12 key files are rejected.
//! - **Inline JSON key**: `keyfile_dict` holds the key document itself.
//!
//! ```rust,ignore
//! use gcp_base_hook::{CredentialResolver, EnvConnections};
//!
//! let resolver = CredentialResolver::new(&EnvConnections::new(), "google_cloud_default", None)?;
//! let client = resolver.authorized_client()?;
//! let resp = client.get("https://storage.googleapis.com/storage/v1/b?project=demo", &Default::default())?;
//! ```

pub mod auth;
pub mod connection;
pub mod credential_file;
pub mod error;
pub mod http;
pub mod project;
pub mod resolver;
pub mod telemetry;

pub use auth::{
    AmbientCredentialSource, CLOUD_PLATFORM_SCOPE, Credentials, DefaultCredentialsChain,
    ServiceAccountKey, TokenProvider,
};
pub use connection::{
    ConnectionConfig, ConnectionRegistry, CredentialSource, EnvConnections, InMemoryConnections,
};
pub use credential_file::{CredentialFileGuard, provide_gcp_credential_file};
pub use error::{HookError, Result};
pub use http::{AuthorizedClient, RequestInterceptor, default_user_agent};
pub use project::{CallArgs, ProjectScoped};
pub use resolver::{CredentialResolver, CredentialResolverBuilder};
