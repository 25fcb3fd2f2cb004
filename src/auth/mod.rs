//! Authentication helpers and token providers.
//!
//! This module turns a connection's credential source into `Credentials`
//! and defines the minimal trait used to supply Bearer tokens to outgoing
//! requests.

use crate::error::Result;

pub mod adc;
pub mod credentials;
pub mod service_account;

pub use adc::{AmbientCredentialSource, DefaultCredentialsChain};
pub use credentials::Credentials;
pub use service_account::ServiceAccountKey;

/// Scope granting access to all Cloud Platform APIs.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// A synchronous Bearer token provider.
///
/// Notes:
/// - The interface is synchronous; credential resolution blocks the caller.
/// - Implementations do not cache: every call obtains a fresh token.
pub trait TokenProvider: Send + Sync {
    /// Returns an access token string suitable for the `Authorization: Bearer <token>` header.
    fn token(&self) -> Result<String>;
}

/// Split a comma separated scope string, falling back to the cloud-platform scope.
pub fn parse_scopes(scope: Option<&str>) -> Vec<String> {
    let scopes: Vec<String> = scope
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if scopes.is_empty() {
        vec![CLOUD_PLATFORM_SCOPE.to_string()]
    } else {
        scopes
    }
}
