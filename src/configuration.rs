use std::fmt;

use chrono::Duration;

use crate::error::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;
const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
const MAX_REFRESH_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .finish()
    }
}

/// Token signing and lifetime settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub access_token_ttl_minutes: i64,  // e.g. 15
    pub refresh_token_ttl_minutes: i64, // e.g. 10080 for 7 days
}

impl JwtSettings {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::minutes(self.refresh_token_ttl_minutes)
    }

    /// Reject a weak secret, or a lifetime that is non-positive or beyond its ceiling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        check_ttl(
            "jwt.access_token_ttl_minutes",
            self.access_token_ttl_minutes,
            MAX_ACCESS_TOKEN_TTL_MINUTES,
        )?;
        check_ttl(
            "jwt.refresh_token_ttl_minutes",
            self.refresh_token_ttl_minutes,
            MAX_REFRESH_TOKEN_TTL_MINUTES,
        )
    }
}

fn check_ttl(key: &str, minutes: i64, max: i64) -> Result<(), ConfigError> {
    if minutes <= 0 {
        return Err(ConfigError::InvalidValue(format!("{} must be positive", key)));
    }
    if minutes > max {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be at most {} minutes",
            key, max
        )));
    }
    Ok(())
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_minutes", &self.refresh_token_ttl_minutes)
            .finish()
    }
}

/// Load settings from `configuration.yaml` (optional) then `APP__*` environment variables.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
