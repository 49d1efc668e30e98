//! Store credentials.
//!
//! The loader passes these through untouched; only stores read them.
//! Every field is optional and an unset field means "use the store default".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const ENV_ENDPOINT_URL: &str = "R2_ENDPOINT_URL";
pub const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";

/// Endpoint and key pair for an S3-compatible object store.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCredentials {
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl StoreCredentials {
    pub fn new(
        endpoint_url: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_url: Some(endpoint_url.into()),
            access_key_id: Some(access_key_id.into()),
            secret_access_key: Some(secret_access_key.into()),
        }
    }

    /// Read `R2_ENDPOINT_URL`, `R2_ACCESS_KEY_ID` and `R2_SECRET_ACCESS_KEY`.
    ///
    /// Returns `None` when none of them is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let creds = Self {
            endpoint_url: non_empty(ENV_ENDPOINT_URL),
            access_key_id: non_empty(ENV_ACCESS_KEY_ID),
            secret_access_key: non_empty(ENV_SECRET_ACCESS_KEY),
        };
        (!creds.is_empty()).then_some(creds)
    }

    /// Parse credentials from a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse credentials TOML: {e}"))
    }

    /// Load credentials from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("read credentials file {}: {e}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Fields set on `self` win; unset ones fall back to `base`.
    pub fn merge_over(self, base: StoreCredentials) -> Self {
        Self {
            endpoint_url: self.endpoint_url.or(base.endpoint_url),
            access_key_id: self.access_key_id.or(base.access_key_id),
            secret_access_key: self.secret_access_key.or(base.secret_access_key),
        }
    }

    /// Both halves of the key pair are present.
    pub fn has_keys(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoint_url.is_none() && self.access_key_id.is_none() && self.secret_access_key.is_none()
    }
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
