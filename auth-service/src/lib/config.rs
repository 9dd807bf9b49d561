use std::env;
use std::time::Duration;

use auth::TokenLifetimes;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::outbound::events::RelaySettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub email: EmailConfig,
    pub application: ApplicationConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
    #[serde(default = "default_verification_token_hours")]
    pub verification_token_hours: i64,
    #[serde(default = "default_reset_token_minutes")]
    pub reset_token_minutes: i64,
}

impl JwtConfig {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access_token: chrono::Duration::minutes(self.access_token_minutes),
            refresh_token: chrono::Duration::days(self.refresh_token_days),
            verification_token: chrono::Duration::hours(self.verification_token_hours),
            reset_token: chrono::Duration::minutes(self.reset_token_minutes),
        }
    }
}

/// Secret the process-wide password salt is derived from.
#[derive(Debug, Deserialize, Clone)]
pub struct PasswordConfig {
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    /// Empty disables delivery; emails are then only logged.
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_use_starttls")]
    pub use_starttls: bool,
    pub from: String,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationConfig {
    /// Base of the links sent by email.
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutboxConfig {
    pub poll_interval_seconds: u64,
    pub grace_seconds: u64,
    pub batch_size: i64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            grace_seconds: 30,
            batch_size: 100,
        }
    }
}

impl OutboxConfig {
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            poll_interval: Duration::from_secs(self.poll_interval_seconds.max(1)),
            grace: Duration::from_secs(self.grace_seconds),
            batch_size: self.batch_size,
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_access_token_minutes() -> i64 {
    15
}

fn default_refresh_token_days() -> i64 {
    7
}

fn default_verification_token_hours() -> i64 {
    24
}

fn default_reset_token_minutes() -> i64 {
    15
}

fn default_smtp_port() -> u16 {
    587
}

fn default_use_starttls() -> bool {
    true
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, JWT__SECRET, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: EMAIL__SMTP_HOST=smtp.example.com overrides email.smtp_host
            .add_source(Environment::default().separator("__"))
            .build()?;

        configuration.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    const MINIMAL: &str = r#"
        [database]
        url = "postgres://localhost/auth"

        [server]
        http_port = 3000

        [jwt]
        secret = "jwt-secret"

        [password]
        secret = "salt-secret"

        [redis]
        url = "redis://127.0.0.1:6379"

        [kafka]
        brokers = "localhost:9092"
        topic = "auth-events"
        group_id = "auth-service-email"

        [email]
        from = "no-reply@example.com"

        [application]
        base_url = "http://localhost:3000"
    "#;

    fn parse(source: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_settings() {
        let config = parse(MINIMAL);

        assert_eq!(config.database.max_connections, 5);
        assert!(config.email.smtp_host.is_empty());
        assert_eq!(config.email.smtp_port, 587);
        assert!(config.email.use_starttls);
        assert_eq!(config.email.templates_dir, "templates");
        assert_eq!(config.outbox.batch_size, 100);

        let lifetimes = config.jwt.lifetimes();
        assert_eq!(lifetimes.access_token, chrono::Duration::minutes(15));
        assert_eq!(lifetimes.refresh_token, chrono::Duration::days(7));
        assert_eq!(lifetimes.verification_token, chrono::Duration::hours(24));
        assert_eq!(lifetimes.reset_token, chrono::Duration::minutes(15));
    }

    #[test]
    fn test_relay_settings_never_poll_in_a_tight_loop() {
        let config = OutboxConfig {
            poll_interval_seconds: 0,
            grace_seconds: 5,
            batch_size: 10,
        };

        let settings = config.relay_settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.grace, Duration::from_secs(5));
    }
}
