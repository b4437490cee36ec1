//! Declarative precache manifest.
//!
//! Replaces the hardcoded cache-name and asset-list globals of a classic
//! offline script with injected configuration: a generation identifier, the
//! application origin, the ordered list of asset paths to precache, and an
//! optional offline fallback page.

use std::path::Path;

use offkit_common::{OffkitError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Manifest describing what the worker precaches and for which deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecacheManifest {
    /// Version-tagged name of the current cache store, e.g. "afm-finance-v1".
    /// Bumping it on redeploy is the sole cache invalidation mechanism.
    pub generation: String,

    /// Origin the worker controls. Only responses same-origin with this URL
    /// are ever stored at runtime.
    pub origin: Url,

    /// Ordered, origin-relative paths fetched and stored eagerly at install.
    pub precache: Vec<String>,

    /// Optional origin-relative path served when a GET misses the cache and
    /// the network is unreachable. When unset, such requests get no
    /// substitute response.
    #[serde(default)]
    pub offline_fallback: Option<String>,
}

impl PrecacheManifest {
    /// Create a manifest with no precache entries.
    pub fn new(generation: impl Into<String>, origin: Url) -> Self {
        Self {
            generation: generation.into(),
            origin,
            precache: Vec::new(),
            offline_fallback: None,
        }
    }

    /// Set the precache asset list.
    pub fn with_precache<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the offline fallback page.
    pub fn with_offline_fallback(mut self, path: impl Into<String>) -> Self {
        self.offline_fallback = Some(path.into());
        self
    }

    /// Parse a manifest from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| OffkitError::config(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate the manifest.
    pub fn validate(&self) -> Result<()> {
        if self.generation.is_empty() {
            return Err(OffkitError::config("generation must not be empty"));
        }
        if self.origin.cannot_be_a_base() || self.origin.host_str().is_none() {
            return Err(OffkitError::config(format!(
                "origin must be an absolute URL with a host: {}",
                self.origin
            )));
        }
        for path in &self.precache {
            if !path.starts_with('/') {
                return Err(OffkitError::config(format!(
                    "precache path must be origin-relative (start with '/'): {path}"
                )));
            }
        }
        if let Some(ref fallback) = self.offline_fallback {
            if !fallback.starts_with('/') {
                return Err(OffkitError::config(format!(
                    "offline fallback must be origin-relative (start with '/'): {fallback}"
                )));
            }
        }
        Ok(())
    }

    /// Resolve an origin-relative path against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.origin.join(path)?)
    }
}
