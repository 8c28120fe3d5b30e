//! API configuration module.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `tambo.toml` in the working directory (optional)
//! 3. `TAMBO_*` environment variables (`TAMBO_PORT`, `TAMBO_JWT_SECRET`, ...)

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use tambo_core::payroll::PayrollRules;
use tambo_core::{Money, DEFAULT_MINIMUM_WAGE};
use tambo_db::DbConfig;

/// Secret used when none is configured. Only for local development.
pub const DEV_JWT_SECRET: &str = "tambo-dev-secret-change-in-production";

/// API server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Bind address
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds
    pub jwt_access_lifetime_secs: i64,

    /// Allowed CORS origin; any origin when unset
    pub cors_origin: Option<String>,

    /// RMV in céntimos, used for asignación familiar and the EsSalud floor
    pub minimum_wage_cents: i64,
}

impl ApiConfig {
    /// Load configuration from `tambo.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            config::Config::builder()
                .add_source(File::with_name("tambo").required(false))
                .add_source(Environment::with_prefix("TAMBO")),
        )
    }

    /// Applies defaults under `builder`'s sources, then validates.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: ApiConfig = builder
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("database_path", "tambo.db")?
            .set_default("db_max_connections", 5)?
            .set_default("jwt_secret", DEV_JWT_SECRET)?
            .set_default("jwt_access_lifetime_secs", 43_200)? // one 12 h shift
            .set_default("minimum_wage_cents", DEFAULT_MINIMUM_WAGE.cents())?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue(
                "jwt_secret must be at least 16 characters".to_string(),
            ));
        }
        if self.jwt_access_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt_access_lifetime_secs must be positive".to_string(),
            ));
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "db_max_connections must be at least 1".to_string(),
            ));
        }
        if self.minimum_wage_cents <= 0 {
            return Err(ConfigError::InvalidValue(
                "minimum_wage_cents must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("bad address {}:{}", self.host, self.port)))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.db_max_connections)
            .connect_timeout(Duration::from_secs(10))
    }

    pub fn payroll_rules(&self) -> PayrollRules {
        PayrollRules {
            minimum_wage: Money::from_cents(self.minimum_wage_cents),
        }
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_builder(config::Config::builder()).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.uses_dev_secret());
        assert_eq!(config.payroll_rules(), PayrollRules::default());
        assert!(config.socket_addr().is_ok());
    }

    #[test]
    fn test_overrides_and_validation() {
        let config = ApiConfig::from_builder(
            config::Config::builder()
                .set_override("port", 9000)
                .unwrap()
                .set_override("minimum_wage_cents", 102_500)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.payroll_rules().minimum_wage.cents(), 102_500);

        let short = ApiConfig::from_builder(
            config::Config::builder().set_override("jwt_secret", "short").unwrap(),
        );
        assert!(matches!(short, Err(ConfigError::InvalidValue(_))));
    }
}
