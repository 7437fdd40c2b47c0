//! Credential and endpoint resolution.
//!
//! Values come from three layers, checked in a fixed order:
//!
//! | Value | 1st | 2nd | 3rd |
//! |-------|-----|-----|-----|
//! | API key | explicit config | secret store | `HUGGINGFACE_API_KEY` |
//! | Endpoint URL | explicit config | `HUGGINGFACE_API_ENDPOINT_URL` | secret store |
//! | Image-host key | explicit config | secret store | `IMAGE_HOST_API_KEY` |
//!
//! The secret store is a TOML file laid out like this:
//!
//! ```toml
//! [huggingface]
//! api_key = "hf_..."
//! endpoint_url = "https://xyz.eu-west-1.aws.endpoints.huggingface.cloud"
//!
//! [image_host]
//! api_key = "..."
//! ```
//!
//! [`CredentialResolver`] holds a snapshot of the store and of the process
//! environment, so resolution is a pure lookup and tests never have to touch
//! real environment variables.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding the extraction API key.
pub const API_KEY_ENV: &str = "HUGGINGFACE_API_KEY";
/// Environment variable holding the extraction endpoint URL.
pub const ENDPOINT_URL_ENV: &str = "HUGGINGFACE_API_ENDPOINT_URL";
/// Environment variable holding the image-hosting API key.
pub const RELAY_API_KEY_ENV: &str = "IMAGE_HOST_API_KEY";
/// Environment variable overriding the secret store location.
pub const SECRETS_FILE_ENV: &str = "EXTRACT_SECRETS_FILE";
/// Secret store location used when nothing else is configured.
pub const DEFAULT_SECRETS_PATH: &str = ".secrets/secrets.toml";
/// Placeholder endpoint meaning "not configured yet".
pub const ENDPOINT_PLACEHOLDER: &str = "YOUR_HUGGINGFACE_INFERENCE_ENDPOINT_URL_HERE";

/// Deployment-provided secrets, parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretStore {
    #[serde(default)]
    huggingface: HuggingFaceSecrets,
    #[serde(default)]
    image_host: ImageHostSecrets,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HuggingFaceSecrets {
    api_key: Option<String>,
    endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ImageHostSecrets {
    api_key: Option<String>,
}

impl SecretStore {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load the store from `path`. A missing or malformed file yields an
    /// empty store: the environment may still supply everything.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!("No secret store at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_toml_str(&content) {
            Ok(store) => {
                debug!("Loaded secret store from {}", path.display());
                store
            }
            Err(e) => {
                debug!("Ignoring unparsable secret store {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.huggingface.api_key.as_deref())
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        non_empty(self.huggingface.endpoint_url.as_deref())
    }

    pub fn relay_api_key(&self) -> Option<&str> {
        non_empty(self.image_host.api_key.as_deref())
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Layered lookup of the API key, endpoint URL and image-host key.
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    explicit_api_key: Option<String>,
    explicit_endpoint_url: Option<String>,
    explicit_relay_api_key: Option<String>,
    secrets: SecretStore,
    env: HashMap<String, String>,
}

impl CredentialResolver {
    /// Resolver over a given secret store and an empty environment.
    pub fn new(secrets: SecretStore) -> Self {
        Self {
            secrets,
            ..Self::default()
        }
    }

    /// Resolver for `config`: explicit values from the config, the secret
    /// store it points at, and a snapshot of the process environment.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        let secrets_path = config
            .secrets_path
            .clone()
            .or_else(|| env.get(SECRETS_FILE_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_PATH));

        Self {
            explicit_api_key: config.api_key.clone(),
            explicit_endpoint_url: config.endpoint_url.clone(),
            explicit_relay_api_key: config.relay_api_key.clone(),
            secrets: SecretStore::load(&secrets_path),
            env,
        }
    }

    /// Add or replace one environment entry in the snapshot.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    fn env(&self, name: &str) -> Option<&str> {
        non_empty(self.env.get(name).map(String::as_str))
    }

    /// Resolve the extraction API key.
    pub fn resolve_api_key(&self) -> Result<String, ExtractError> {
        if let Some(key) = non_empty(self.explicit_api_key.as_deref()) {
            return Ok(key.to_string());
        }
        if let Some(key) = self.secrets.api_key() {
            debug!("Using API key from secret store");
            return Ok(key.to_string());
        }
        if let Some(key) = self.env(API_KEY_ENV) {
            debug!("Using API key from {}", API_KEY_ENV);
            return Ok(key.to_string());
        }

        Err(ExtractError::Credential {
            hint: format!(
                "Add `api_key = \"hf_...\"` under [huggingface] in the secrets file \
                 ({DEFAULT_SECRETS_PATH} or ${SECRETS_FILE_ENV}), \
                 or set {API_KEY_ENV} in the environment or a .env file."
            ),
        })
    }

    /// Resolve the extraction endpoint URL, rejecting the placeholder.
    pub fn resolve_endpoint_url(&self) -> Result<String, ExtractError> {
        let url = non_empty(self.explicit_endpoint_url.as_deref())
            .or_else(|| self.env(ENDPOINT_URL_ENV))
            .or_else(|| self.secrets.endpoint_url())
            .unwrap_or(ENDPOINT_PLACEHOLDER);

        if url.is_empty() || url == ENDPOINT_PLACEHOLDER {
            return Err(ExtractError::Config(format!(
                "inference endpoint URL is not configured. \
                 Set {ENDPOINT_URL_ENV} in the environment or a .env file, \
                 or add `endpoint_url` under [huggingface] in the secrets file."
            )));
        }
        Ok(url.to_string())
    }

    /// Resolve the image-hosting key. `None` disables the relay.
    pub fn resolve_relay_api_key(&self) -> Option<String> {
        non_empty(self.explicit_relay_api_key.as_deref())
            .or_else(|| self.secrets.relay_api_key())
            .or_else(|| self.env(RELAY_API_KEY_ENV))
            .map(str::to_string)
    }
}
