//! Environment-driven server configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use jurisgen_core::AiSettings;
use jurisgen_generate::DEFAULT_TIMEOUT;

use crate::logging::LogFormat;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DATABASE_URL: &str = "sqlite:///contracts.db";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_PROVIDER: &str = "google";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid HOST '{0}'")]
    InvalidHost(String),
    #[error("invalid PORT '{0}'")]
    InvalidPort(String),
    #[error("unsupported DATABASE_URL '{0}': only sqlite URLs are supported")]
    UnsupportedDatabase(String),
    #[error("invalid GENERATION_TIMEOUT_SECS '{0}'")]
    InvalidTimeout(String),
    #[error("invalid LOG_FORMAT '{0}': expected text or json")]
    InvalidLogFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts `sqlite:///relative.db`, `sqlite:////abs/path.db`,
    /// `sqlite://:memory:` or a bare path.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        let path = match url.strip_prefix("sqlite://") {
            Some(rest) => rest.strip_prefix('/').unwrap_or(rest),
            None if url.contains("://") => {
                return Err(ConfigError::UnsupportedDatabase(url.to_string()))
            }
            None => url,
        };
        if path.is_empty() || path == ":memory:" {
            return Ok(DatabaseLocation::InMemory);
        }
        Ok(DatabaseLocation::File(PathBuf::from(path)))
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub database: DatabaseLocation,
    pub frontend_url: Option<String>,
    pub ai: AiSettings,
    pub generation_timeout: Duration,
    pub rules_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::InvalidHost(host.clone()))?;
        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let database = DatabaseLocation::parse(
            &get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        )?;

        let frontend_url = match get("FRONTEND_URL") {
            Some(url) if url == "*" => None,
            Some(url) => Some(url),
            None => Some(DEFAULT_FRONTEND_URL.to_string()),
        };

        let ai = AiSettings {
            provider: get("AI_PROVIDER")
                .map(|p| p.to_ascii_lowercase())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            api_key: get("AI_API_KEY").or_else(|| get("GEMINI_API_KEY")).unwrap_or_default(),
            model: get("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        let timeout_secs = match get("GENERATION_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(raw))?
                .clamp(1, MAX_TIMEOUT_SECS),
            None => DEFAULT_TIMEOUT.as_secs(),
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidLogFormat(raw))?,
            None => LogFormat::Text,
        };

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            database,
            frontend_url,
            ai,
            generation_timeout: Duration::from_secs(timeout_secs),
            rules_path: get("RULES_PATH").map(PathBuf::from),
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.database, DatabaseLocation::File(PathBuf::from("contracts.db")));
        assert_eq!(cfg.frontend_url.as_deref(), Some("http://localhost:5173"));
        assert_eq!(cfg.ai.provider, "google");
        assert_eq!(cfg.ai.model, "gemini-1.5-flash");
        assert!(cfg.ai.api_key.is_empty());
        assert_eq!(cfg.generation_timeout, Duration::from_secs(30));
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert!(cfg.rules_path.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DATABASE_URL", "sqlite://:memory:"),
            ("FRONTEND_URL", "*"),
            ("AI_PROVIDER", "OpenAI"),
            ("GEMINI_API_KEY", "gem"),
            ("AI_API_KEY", "explicit"),
            ("GENERATION_TIMEOUT_SECS", "9999"),
            ("RULES_PATH", "/etc/jurisgen/rules.yaml"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.database, DatabaseLocation::InMemory);
        assert_eq!(cfg.frontend_url, None);
        assert_eq!(cfg.ai.provider, "openai");
        assert_eq!(cfg.ai.api_key, "explicit");
        assert_eq!(cfg.generation_timeout, Duration::from_secs(600));
        assert_eq!(cfg.rules_path, Some(PathBuf::from("/etc/jurisgen/rules.yaml")));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn database_urls() {
        assert_eq!(
            DatabaseLocation::parse("sqlite:////var/lib/contracts.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/var/lib/contracts.db"))
        );
        assert_eq!(
            DatabaseLocation::parse("data/contracts.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("data/contracts.db"))
        );
        assert_eq!(
            DatabaseLocation::parse("postgres://db/contracts"),
            Err(ConfigError::UnsupportedDatabase("postgres://db/contracts".into()))
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(config(&[("PORT", "http")]).unwrap_err(), ConfigError::InvalidPort("http".into()));
        assert_eq!(
            config(&[("GENERATION_TIMEOUT_SECS", "soon")]).unwrap_err(),
            ConfigError::InvalidTimeout("soon".into())
        );
        assert_eq!(
            config(&[("LOG_FORMAT", "xml")]).unwrap_err(),
            ConfigError::InvalidLogFormat("xml".into())
        );
        assert_eq!(config(&[("HOST", "localhost")]).unwrap_err(), ConfigError::InvalidHost("localhost".into()));
    }

    #[test]
    fn zero_timeout_is_clamped_up() {
        let cfg = config(&[("GENERATION_TIMEOUT_SECS", "0")]).unwrap();
        assert_eq!(cfg.generation_timeout, Duration::from_secs(1));
    }
}
