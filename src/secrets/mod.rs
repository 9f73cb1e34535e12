/// Secret Resolver
///
/// Resolves named configuration secrets (signing keys, token lifetimes).
/// Lookup order:
/// 1. process environment variable with the exact name (read on every call)
/// 2. the `secrets.local` configuration table (read on every call)
/// 3. outside production: fail with `ConfigError::Unavailable`
/// 4. the per-resolver cache of remote values
/// 5. the remote secret store, retried with backoff on transient failures
///
/// Remote values are cached for the lifetime of the resolver. Failures are never cached.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::configuration::{Environment, SecretSettings};
use crate::error::ConfigError;

mod vault;

pub use vault::VaultSecretStore;

/// Failure reported by a remote secret store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretStoreError {
    NotFound,
    /// Network failure or server-side error; worth retrying
    Transient(String),
    /// Permission or request error; retrying will not help
    Rejected(String),
}

impl fmt::Display for SecretStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretStoreError::NotFound => write!(f, "secret not found"),
            SecretStoreError::Transient(msg) => write!(f, "secret store unavailable: {}", msg),
            SecretStoreError::Rejected(msg) => write!(f, "secret store rejected request: {}", msg),
        }
    }
}

impl std::error::Error for SecretStoreError {}

/// A remote source of secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<String, SecretStoreError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Exponential delay with up to 50% random jitter
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = self.base_delay.as_millis() as u64 / 2;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        exp + jitter
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

pub struct SecretResolver {
    environment: Environment,
    local: HashMap<String, String>,
    remote: Option<Arc<dyn SecretStore>>,
    cache: RwLock<HashMap<String, String>>,
    retry: RetryPolicy,
}

impl SecretResolver {
    pub fn new(
        environment: Environment,
        local: HashMap<String, String>,
        remote: Option<Arc<dyn SecretStore>>,
        retry: RetryPolicy,
    ) -> Self {
        let local = local
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self {
            environment,
            local,
            remote,
            cache: RwLock::new(HashMap::new()),
            retry,
        }
    }

    /// Build a resolver from settings, wiring the vault store when one is configured
    pub fn from_settings(settings: &SecretSettings) -> Result<Self, ConfigError> {
        let remote: Option<Arc<dyn SecretStore>> = match &settings.vault {
            Some(vault) => Some(Arc::new(VaultSecretStore::new(vault)?)),
            None => None,
        };
        let retry = RetryPolicy {
            attempts: settings.retry_attempts.max(1),
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
        };
        Ok(Self::new(
            settings.environment,
            settings.local.clone(),
            remote,
            retry,
        ))
    }

    /// Resolve a secret by name
    ///
    /// # Errors
    /// `ConfigError::Unavailable` if no source has a non-empty value or the remote store fails.
    pub async fn get(&self, name: &str) -> Result<String, ConfigError> {
        if let Some(value) = self.lookup_local(name) {
            return Ok(value);
        }

        if !self.environment.uses_remote_secrets() {
            tracing::debug!(secret = name, "Secret not configured locally");
            return Err(ConfigError::Unavailable(name.to_string()));
        }

        if let Some(value) = self.cached(name) {
            return Ok(value);
        }

        let store = self.remote.as_ref().ok_or_else(|| {
            tracing::error!(secret = name, "No remote secret store configured");
            ConfigError::Unavailable(name.to_string())
        })?;

        let value = self.fetch_with_retry(store.as_ref(), name).await?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(name.to_string(), value.clone());
        }
        Ok(value)
    }

    /// Resolve a secret holding a positive number of seconds
    pub async fn get_seconds(&self, name: &str) -> Result<i64, ConfigError> {
        let raw = self.get(name).await?;
        match raw.trim().parse::<i64>() {
            Ok(seconds) if seconds > 0 => Ok(seconds),
            _ => Err(ConfigError::InvalidValue(format!(
                "{} must be a positive number of seconds",
                name
            ))),
        }
    }

    /// Resolve every name once, failing on the first one that is unavailable
    pub async fn preload(&self, names: &[&str]) -> Result<(), ConfigError> {
        for name in names {
            self.get(name).await?;
        }
        Ok(())
    }

    fn lookup_local(&self, name: &str) -> Option<String> {
        if let Ok(value) = std::env::var(name) {
            if !value.is_empty() {
                return Some(value);
            }
        }
        self.local
            .get(&name.to_lowercase())
            .filter(|value| !value.is_empty())
            .cloned()
    }

    fn cached(&self, name: &str) -> Option<String> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(name).cloned())
    }

    async fn fetch_with_retry(
        &self,
        store: &dyn SecretStore,
        name: &str,
    ) -> Result<String, ConfigError> {
        let mut attempt = 0;
        loop {
            match store.fetch(name).await {
                Ok(value) if !value.is_empty() => {
                    tracing::info!(secret = name, "Secret resolved from remote store");
                    return Ok(value);
                }
                Ok(_) | Err(SecretStoreError::NotFound) => {
                    tracing::error!(secret = name, "Secret missing from remote store");
                    return Err(ConfigError::Unavailable(name.to_string()));
                }
                Err(SecretStoreError::Rejected(msg)) => {
                    tracing::error!(secret = name, error = %msg, "Remote secret store rejected lookup");
                    return Err(ConfigError::Unavailable(name.to_string()));
                }
                Err(SecretStoreError::Transient(msg)) => {
                    attempt += 1;
                    if attempt >= self.retry.attempts {
                        tracing::error!(
                            secret = name,
                            attempts = attempt,
                            error = %msg,
                            "Remote secret store unreachable"
                        );
                        return Err(ConfigError::Unavailable(name.to_string()));
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    tracing::warn!(
                        secret = name,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "Retrying remote secret lookup"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
