use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::{SecretStore, SecretStoreError};
use crate::configuration::VaultSettings;
use crate::error::ConfigError;

/// Remote secret store backed by a Vault KV v2 secret.
///
/// All named secrets live as fields of one secret at `<mount>/data/<path>`.
pub struct VaultSecretStore {
    client: Client,
    url: String,
    token: String,
}

impl VaultSecretStore {
    pub fn new(settings: &VaultSettings) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(concat!("texas_auth/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("vault client: {}", e)))?;

        let url = format!(
            "{}/v1/{}/data/{}",
            settings.base_url.trim_end_matches('/'),
            settings.mount.trim_matches('/'),
            settings.path.trim_matches('/')
        );

        Ok(Self {
            client,
            url,
            token: settings.token.clone(),
        })
    }
}

fn vault_error_message(json_response: &Value) -> &str {
    json_response
        .get("errors")
        .and_then(|v| v.get(0))
        .and_then(Value::as_str)
        .unwrap_or("")
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn fetch(&self, name: &str) -> Result<String, SecretStoreError> {
        let response = self
            .client
            .get(&self.url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| SecretStoreError::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SecretStoreError::NotFound);
        }

        let json_response: Value = response
            .json()
            .await
            .map_err(|e| SecretStoreError::Transient(format!("invalid response body: {}", e)))?;

        if !status.is_success() {
            let message = format!("{} - {}", status, vault_error_message(&json_response));
            return if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(SecretStoreError::Transient(message))
            } else {
                Err(SecretStoreError::Rejected(message))
            };
        }

        let fields = json_response.get("data").and_then(|v| v.get("data"));
        fields
            .and_then(|f| f.get(name).or_else(|| f.get(name.to_lowercase())))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(SecretStoreError::NotFound)
    }
}
