//! Configuration loading with layered overrides.
//!
//! Config is loaded in order (each layer overrides the previous):
//! 1. Default values
//! 2. Config file (TOML)
//! 3. Environment variables
//! 4. CLI arguments
//!
//! JWT secret is never read from config files for security - it must come from
//! environment variable or CLI argument.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub access: Access,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Permission store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "permissions.db".to_string()
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    /// JWT secret for token signing/verification.
    /// Must be provided via environment variable or CLI - never from config file.
    #[serde(default)]
    pub jwt_secret: String,

    /// Token expiry in days.
    #[serde(default = "default_token_expiry_days")]
    pub token_expiry_days: u32,

    /// Cookie carrying the session token for page requests.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_days: default_token_expiry_days(),
            session_cookie: default_session_cookie(),
        }
    }
}

fn default_token_expiry_days() -> u32 {
    30
}

fn default_session_cookie() -> String {
    "access_token".to_string()
}

/// Authorization behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Access {
    /// Cache effective permission sets per principal.
    #[serde(default = "default_true")]
    pub cache_permissions: bool,

    /// Maximum number of cached principals.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Write an audit row for every denied check.
    #[serde(default = "default_true")]
    pub audit_denials: bool,

    /// Page guards redirect unauthenticated requests here.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Page guards redirect authenticated but unauthorized requests here.
    #[serde(default = "default_unauthorized_path")]
    pub unauthorized_path: String,
}

impl Default for Access {
    fn default() -> Self {
        Self {
            cache_permissions: true,
            cache_capacity: default_cache_capacity(),
            audit_denials: true,
            login_path: default_login_path(),
            unauthorized_path: default_unauthorized_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    crate::cache::DEFAULT_CAPACITY
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_unauthorized_path() -> String {
    "/unauthorized".to_string()
}

/// CLI-level overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub host: Option<&'a str>,
    pub port: Option<u16>,
    pub database_url: Option<&'a str>,
    pub jwt_secret: Option<&'a str>,
}

/// Builder for loading configuration with customizable options.
#[derive(Debug, Clone)]
pub struct Loader {
    /// Environment variable prefix (e.g., "MYAPP" -> MYAPP_HOST, MYAPP_PORT)
    pub env_prefix: String,
    /// Name of the JWT secret environment variable (without prefix)
    pub jwt_secret_env: String,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            env_prefix: "TURNSTILE".to_string(),
            jwt_secret_env: "JWT_SECRET".to_string(),
        }
    }
}

impl Loader {
    /// Create a new config loader with the given environment prefix.
    pub fn new(env_prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: env_prefix.into(),
            ..Default::default()
        }
    }

    /// Load configuration from file, environment, and CLI overrides.
    pub fn load(&self, config_path: Option<&Path>, overrides: &Overrides<'_>) -> crate::Result<Config> {
        let mut config: Config = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?
            }
            None => Config::default(),
        };

        // Clear any jwt_secret from config file - security requirement
        config.auth.jwt_secret = String::new();

        let prefix = &self.env_prefix;
        let env = |name: &str| std::env::var(format!("{prefix}_{name}")).ok();

        if let Some(host) = env("HOST") {
            config.server.host = host;
        }
        if let Some(port) = env("PORT")
            && let Ok(p) = port.parse()
        {
            config.server.port = p;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(secret) = env(&self.jwt_secret_env) {
            config.auth.jwt_secret = secret;
        }
        if let Some(cache) = env("CACHE_PERMISSIONS") {
            config.access.cache_permissions = parse_flag(&cache)?;
        }

        if let Some(host) = overrides.host {
            config.server.host = host.to_string();
        }
        if let Some(port) = overrides.port {
            config.server.port = port;
        }
        if let Some(url) = overrides.database_url {
            config.database.url = url.to_string();
        }
        if let Some(secret) = overrides.jwt_secret {
            config.auth.jwt_secret = secret.to_string();
        }

        if config.auth.jwt_secret.is_empty() {
            return Err(Error::Config(format!(
                "{}_{} must be set via environment variable or --jwt-secret flag",
                prefix, self.jwt_secret_env
            )));
        }
        for (name, path) in [
            ("login_path", &config.access.login_path),
            ("unauthorized_path", &config.access.unauthorized_path),
        ] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!("access.{name} must be an absolute path")));
            }
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> crate::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("Invalid boolean: {other}"))),
    }
}
