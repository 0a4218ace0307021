use std::env;

use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

/// Fallback signing secret for local development only.
const LOCAL_JWT_SECRET: &str = "canine-canaan-local-development-secret";

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup and
/// then shared, immutable, through the application state via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which secrets are mandatory.
    pub env: Env,
    // Where the relational store lives.
    pub database: DatabaseConfig,
    // HMAC secret used to sign and verify access tokens.
    pub jwt_secret: String,
    // Fixed lifetime of every issued token, also the blacklist expiration horizon.
    pub token_ttl_hours: i64,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Seconds between sweeps of expired blacklist rows. Zero disables the sweep.
    pub token_purge_interval_secs: u64,
}

/// Env
///
/// Defines the runtime context: developer-friendly defaults locally, explicit secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// DatabaseConfig
///
/// Either a full connection URL or the discrete host/port/user/password/name parts.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

impl DatabaseConfig {
    /// Connection options for the sqlx pool. `DATABASE_URL` wins over the discrete parts.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.url {
            return url.parse();
        }

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name))
    }
}

impl Default for AppConfig {
    /// Safe values for tests; never touches the process environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            database: DatabaseConfig {
                url: None,
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "password".to_string(),
                name: "canine_canaan_test".to_string(),
                max_connections: 5,
            },
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            bind_addr: "0.0.0.0:3000".to_string(),
            token_purge_interval_secs: 0,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment. Production refuses to start without the
    /// signing secret and database credentials; local mode falls back to development defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match (&env, env::var("JWT_SECRET_KEY")) {
            (_, Ok(secret)) if !secret.is_empty() => secret,
            (Env::Production, _) => return Err(ConfigError::Missing("JWT_SECRET_KEY")),
            (Env::Local, _) => LOCAL_JWT_SECRET.to_string(),
        };

        let url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let credential = |var: &'static str, local_default: &str| match env::var(var) {
            Ok(value) => Ok(value),
            Err(_) if env == Env::Production && url.is_none() => Err(ConfigError::Missing(var)),
            Err(_) => Ok(local_default.to_string()),
        };

        let database = DatabaseConfig {
            host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: parse_var("DB_PORT", 5432)?,
            user: credential("DB_USER", "postgres")?,
            password: credential("DB_PASSWORD", "password")?,
            name: credential("DB_NAME", "canine_canaan")?,
            max_connections: parse_var("DB_MAX_CONNECTIONS", 5)?,
            url,
        };

        let token_ttl_hours = parse_var("TOKEN_TTL_HOURS", 24)?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(ConfigError::Invalid {
                var: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            });
        }

        Ok(Self {
            env,
            database,
            jwt_secret,
            token_ttl_hours,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            token_purge_interval_secs: parse_var("TOKEN_PURGE_INTERVAL_SECS", 0)?,
        })
    }
}

/// One year. Larger lifetimes overflow the expiry arithmetic.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
