//! Scoped export of a connection's key through `GOOGLE_APPLICATION_CREDENTIALS`.
//!
//! Subprocesses and libraries that only understand the environment variable
//! convention get credentials through a [`CredentialFileGuard`]. Acquiring the
//! guard points the variable at the connection's key file, or at a temporary
//! copy of its inline key; dropping it restores the previous value and deletes
//! the temporary file.
//!
//! The variable is process-global. Guards acquired concurrently from several
//! threads race on it and the last writer wins; callers that need isolated
//! hand-off must serialize around the guard themselves.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::auth::adc::GOOGLE_APPLICATION_CREDENTIALS;
use crate::connection::ConnectionConfig;
use crate::error::{HookError, Result};

/// Restores `GOOGLE_APPLICATION_CREDENTIALS` on drop.
#[derive(Debug)]
pub struct CredentialFileGuard {
    previous: Option<OsString>,
    exported: Option<PathBuf>,
    // Held so the file lives exactly as long as the guard.
    _temp_file: Option<NamedTempFile>,
}

impl CredentialFileGuard {
    /// Export the connection's key, if it has one.
    ///
    /// Without `key_path` or `keyfile_dict` the environment is left untouched.
    pub fn acquire(config: &ConnectionConfig) -> Result<Self> {
        let (exported, temp_file) = if let Some(key_path) = config.key_path() {
            if key_path.ends_with(".p12") {
                return Err(HookError::UnsupportedKeyFormat);
            }
            (Some(PathBuf::from(key_path)), None)
        } else if let Some(keyfile_dict) = config.keyfile_dict() {
            let mut file = NamedTempFile::new().map_err(HookError::CredentialFile)?;
            file.write_all(keyfile_dict.as_bytes())
                .and_then(|_| file.flush())
                .map_err(HookError::CredentialFile)?;
            (Some(file.path().to_path_buf()), Some(file))
        } else {
            (None, None)
        };

        let previous = std::env::var_os(GOOGLE_APPLICATION_CREDENTIALS);
        if let Some(path) = &exported {
            tracing::debug!(target: "gcp_base_hook::credential_file", path = %path.display(), "exporting {GOOGLE_APPLICATION_CREDENTIALS}");
            // SAFETY: process-global; concurrent guards race (last writer wins).
            unsafe {
                std::env::set_var(GOOGLE_APPLICATION_CREDENTIALS, path);
            }
        }

        Ok(Self {
            previous,
            exported,
            _temp_file: temp_file,
        })
    }

    /// Path the variable points at while the guard lives.
    pub fn path(&self) -> Option<&Path> {
        self.exported.as_deref()
    }
}

impl Drop for CredentialFileGuard {
    fn drop(&mut self) {
        if self.exported.is_none() {
            return;
        }
        // SAFETY: see `acquire`.
        match &self.previous {
            Some(v) => unsafe {
                std::env::set_var(GOOGLE_APPLICATION_CREDENTIALS, v);
            },
            None => unsafe {
                std::env::remove_var(GOOGLE_APPLICATION_CREDENTIALS);
            },
        }
    }
}

/// Run `op` while `config`'s key is exported.
pub fn provide_gcp_credential_file<T, F>(config: &ConnectionConfig, op: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _guard = CredentialFileGuard::acquire(config)?;
    op()
}
