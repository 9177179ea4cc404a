//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero configuration
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Used when `TOKEN_SECRET` is unset. Never deploy with it.
pub const DEV_TOKEN_SECRET: &str = "courier-dev-secret";

#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP and WebSocket API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./courier.db`
    pub database_path: PathBuf,

    /// HMAC secret used to sign and verify bearer tokens.
    /// Env: `TOKEN_SECRET`
    pub token_secret: String,

    /// Request body limit in bytes.
    /// Env: `MAX_BODY_BYTES`
    /// Default: 64 KiB
    pub max_body_bytes: usize,
}

// The secret stays out of logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("dev_secret", &self.uses_dev_secret())
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: PathBuf::from("./courier.db"),
            token_secret: DEV_TOKEN_SECRET.to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        match lookup("TOKEN_SECRET") {
            Some(secret) if !secret.is_empty() => config.token_secret = secret,
            _ => tracing::warn!("TOKEN_SECRET not set, using the development secret"),
        }

        if let Some(val) = lookup("MAX_BODY_BYTES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_body_bytes = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_BODY_BYTES, using default"),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.token_secret == DEV_TOKEN_SECRET
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.database_path, PathBuf::from("./courier.db"));
        assert_eq!(config.max_body_bytes, 65536);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/var/lib/courier/db.sqlite"),
            ("TOKEN_SECRET", "s3cret"),
            ("MAX_BODY_BYTES", "1024"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, PathBuf::from("/var/lib/courier/db.sqlite"));
        assert_eq!(config.token_secret, "s3cret");
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[("HTTP_ADDR", "nope"), ("MAX_BODY_BYTES", "0"), ("TOKEN_SECRET", "")]);
        assert_eq!(config.http_addr, ServerConfig::default().http_addr);
        assert_eq!(config.max_body_bytes, 65536);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = load(&[("TOKEN_SECRET", "hunter2")]);
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
