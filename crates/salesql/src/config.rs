//! Database connection settings.
//!
//! Resolution order (later wins): built-in defaults, the `[database]` table of
//! an optional TOML file, then `DB_*` environment variables (a `.env` file is
//! loaded first via `dotenvy`).
//!
//! ```toml
//! [database]
//! host = "db.internal"
//! user = "analyst"
//! database = "sales"
//! port = 5432
//! ```

use crate::error::{SqlError, SqlResult};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tokio_postgres::config::Host;

pub const ENV_HOST: &str = "DB_HOST";
pub const ENV_USER: &str = "DB_USER";
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_DATABASE: &str = "DB_NAME";
pub const ENV_PORT: &str = "DB_PORT";

/// File picked up by [`DbConfig::load`] when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "salesql.toml";

/// The five values `connect` consumes.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            database: "sales".to_string(),
            port: 5432,
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database: Option<DbConfig>,
}

impl DbConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            port,
        }
    }

    /// Defaults overridden by the process environment (after loading `.env`).
    pub fn from_env() -> SqlResult<Self> {
        dotenvy::dotenv().ok();
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Full resolution: defaults, TOML file, environment.
    ///
    /// With `path = None` the file is [`DEFAULT_CONFIG_FILE`] if it exists.
    /// An explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> SqlResult<Self> {
        dotenvy::dotenv().ok();
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_toml_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_toml_file(path: &Path) -> SqlResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SqlError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            SqlError::Config(msg) => SqlError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse the `[database]` table; a missing table or field keeps the default.
    pub fn from_toml_str(raw: &str) -> SqlResult<Self> {
        let file: ConfigFile =
            toml::from_str(raw).map_err(|e| SqlError::Config(format!("invalid TOML: {e}")))?;
        Ok(file.database.unwrap_or_default())
    }

    /// Settings from a `postgres://` URL or key/value connection string.
    pub fn from_url(url: &str) -> SqlResult<Self> {
        let pg: tokio_postgres::Config = url
            .parse()
            .map_err(|e: tokio_postgres::Error| SqlError::Config(e.to_string()))?;
        let mut cfg = Self::default();
        match pg.get_hosts().first() {
            Some(Host::Tcp(host)) => cfg.host = host.clone(),
            #[allow(unreachable_patterns)]
            Some(_) => {
                return Err(SqlError::Config(
                    "unix socket hosts are not supported".to_string(),
                ));
            }
            None => {}
        }
        if let Some(user) = pg.get_user() {
            cfg.user = user.to_string();
        }
        if let Some(password) = pg.get_password() {
            cfg.password = String::from_utf8_lossy(password).into_owned();
        }
        if let Some(db) = pg.get_dbname() {
            cfg.database = db.to_string();
        }
        if let Some(port) = pg.get_ports().first() {
            cfg.port = *port;
        }
        Ok(cfg)
    }

    /// Override fields from `lookup` (normally the environment). Empty values are ignored.
    pub fn with_env<F>(mut self, lookup: F) -> SqlResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_HOST) {
            self.host = v;
        }
        if let Some(v) = get(ENV_USER) {
            self.user = v;
        }
        // An explicitly empty password is legitimate.
        if let Some(v) = lookup(ENV_PASSWORD) {
            self.password = v;
        }
        if let Some(v) = get(ENV_DATABASE) {
            self.database = v;
        }
        if let Some(v) = get(ENV_PORT) {
            self.port = v.trim().parse().map_err(|_| {
                SqlError::Config(format!("{ENV_PORT} must be a port number, got '{v}'"))
            })?;
        }
        Ok(self)
    }

    /// Driver configuration for these settings.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .user(&self.user)
            .dbname(&self.database)
            .port(self.port)
            .application_name("salesql");
        if !self.password.is_empty() {
            pg.password(&self.password);
        }
        pg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_without_env() {
        let cfg = DbConfig::default().with_env(env(&[])).unwrap();
        assert_eq!(cfg, DbConfig::new("localhost", "postgres", "", "sales", 5432));
    }

    #[test]
    fn env_overrides_every_field() {
        let cfg = DbConfig::default()
            .with_env(env(&[
                ("DB_HOST", "db"),
                ("DB_USER", "analyst"),
                ("DB_PASSWORD", "s3cret"),
                ("DB_NAME", "warehouse"),
                ("DB_PORT", "6543"),
            ]))
            .unwrap();
        assert_eq!(cfg, DbConfig::new("db", "analyst", "s3cret", "warehouse", 6543));
    }

    #[test]
    fn bad_port_is_config_error() {
        let err = DbConfig::default()
            .with_env(env(&[("DB_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, SqlError::Config(ref m) if m.contains("DB_PORT")));
    }

    #[test]
    fn toml_table_fills_missing_fields_with_defaults() {
        let cfg = DbConfig::from_toml_str("[database]\nhost = \"db.internal\"\nport = 15432\n").unwrap();
        assert_eq!(cfg.host, "db.internal");
        assert_eq!(cfg.port, 15432);
        assert_eq!(cfg.database, "sales");
    }

    #[test]
    fn toml_without_database_table_is_default() {
        assert_eq!(DbConfig::from_toml_str("").unwrap(), DbConfig::default());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        assert!(matches!(
            DbConfig::from_toml_str("[database\nhost="),
            Err(SqlError::Config(_))
        ));
    }

    #[test]
    fn env_wins_over_file() {
        let cfg = DbConfig::from_toml_str("[database]\nhost = \"from-file\"\nuser = \"file-user\"\n")
            .unwrap()
            .with_env(env(&[("DB_HOST", "from-env")]))
            .unwrap();
        assert_eq!(cfg.host, "from-env");
        assert_eq!(cfg.user, "file-user");
    }

    #[test]
    fn parses_connection_url() {
        let cfg = DbConfig::from_url("postgres://ana:pw@db.example:6000/shop").unwrap();
        assert_eq!(cfg, DbConfig::new("db.example", "ana", "pw", "shop", 6000));
    }

    #[test]
    fn debug_masks_password() {
        let cfg = DbConfig::new("h", "u", "hunter2", "d", 1);
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
