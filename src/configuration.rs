use std::collections::HashMap;

use config::ConfigError;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    /// Absent means the in-memory user store is used
    #[serde(default)]
    pub database: Option<DatabaseSettings>,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub cookies: CookieSettings,
    #[serde(default)]
    pub hashing: HashingSettings,
    pub secrets: SecretSettings,
    pub email: EmailSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Origin of the UI that serves the action-link pages
    pub ui_url: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT settings that are not secrets
#[derive(Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub issuer: String,
    /// Clear the stored refresh hash when a stale refresh token is replayed
    #[serde(default)]
    pub revoke_on_reuse: bool,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct CookieSettings {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

/// Cost bounds bcrypt accepts
pub const MIN_HASH_COST: u32 = 4;
pub const MAX_HASH_COST: u32 = 31;

#[derive(Deserialize, Clone, Debug)]
pub struct HashingSettings {
    pub cost: u32,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Only production falls through to the remote secret store
    pub fn uses_remote_secrets(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct SecretSettings {
    pub environment: Environment,
    /// Values read through on every lookup, after the process environment.
    /// Matched case-insensitively.
    #[serde(default)]
    pub local: HashMap<String, String>,
    #[serde(default)]
    pub vault: Option<VaultSettings>,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

#[derive(Deserialize, Clone, Debug)]
pub struct VaultSettings {
    pub base_url: String,
    pub token: String,
    #[serde(default = "default_vault_mount")]
    pub mount: String,
    pub path: String,
}

fn default_vault_mount() -> String {
    "secret".to_string()
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Log,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EmailSettings {
    pub transport: TransportKind,
    pub sender: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub authorization_token: Option<String>,
    #[serde(default = "default_email_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_email_timeout_ms() -> u64 {
    10_000
}

impl EmailSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// Load settings from `configuration.yaml` (optional) and `APP__*` environment variables.
///
/// `APP__APPLICATION__PORT=9000` overrides `application.port`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.hashing.cost) {
            return Err(ConfigError::Message(format!(
                "hashing.cost must be between {} and {}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        if self.email.transport == TransportKind::Http && self.email.base_url.is_none() {
            return Err(ConfigError::Message(
                "email.base_url is required for the http transport".to_string(),
            ));
        }
        if self.secrets.environment.uses_remote_secrets() && self.secrets.vault.is_none() {
            tracing::warn!("Production environment without a vault: only local secrets resolve");
        }
        Ok(())
    }
}
