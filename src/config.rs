//! Configuration loading.
//!
//! Settings come from an optional TOML file, then environment variables
//! override the backend connection fields. A missing config file is not an
//! error: every field has a default, matching a local single-node Wazuh
//! indexer.
//!
//! ```toml
//! [backend]
//! host = "wazuh-indexer.internal"
//! port = 9200
//! username = "admin"
//! use_ssl = true
//! verify_certs = false
//! timeout_secs = 30
//!
//! [indices]
//! archives = "wazuh-archives-*"
//! alerts = "wazuh-alerts-*"
//! agents = "wazuh-agent-*"
//!
//! [search]
//! failure_mode = "lenient"   # or "strict"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `OPENSEARCH_HOST` | `backend.host` |
//! | `OPENSEARCH_PORT` | `backend.port` |
//! | `OPENSEARCH_USER` | `backend.username` |
//! | `OPENSEARCH_PASSWORD` | `backend.password` |
//! | `OPENSEARCH_USE_SSL` | `backend.use_ssl` |
//! | `OPENSEARCH_VERIFY_CERTS` | `backend.verify_certs` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use wazuh_search_core::{FailureMode, IndexPatterns};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub indices: IndexPatterns,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub use_ssl: bool,
    #[serde(default)]
    pub verify_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            use_ssl: true,
            verify_certs: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("use_ssl", &self.use_ssl)
            .field("verify_certs", &self.verify_certs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl BackendConfig {
    /// `http(s)://host:port`, without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    9200
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SearchConfig {
    #[serde(default)]
    pub failure_mode: FailureMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Load configuration from `path` (if it exists) and the process environment.
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], with an explicit environment lookup.
pub fn load_config_with_env<F>(path: &Path, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env_overrides(&mut config, env)?;
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut Config, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = &mut config.backend;

    if let Some(host) = env("OPENSEARCH_HOST") {
        backend.host = host;
    }
    if let Some(port) = env("OPENSEARCH_PORT") {
        backend.port = port
            .trim()
            .parse()
            .with_context(|| format!("OPENSEARCH_PORT is not a valid port: '{}'", port))?;
    }
    if let Some(user) = env("OPENSEARCH_USER") {
        backend.username = Some(user);
    }
    if let Some(password) = env("OPENSEARCH_PASSWORD") {
        backend.password = Some(password);
    }
    if let Some(v) = env("OPENSEARCH_USE_SSL") {
        backend.use_ssl = parse_bool("OPENSEARCH_USE_SSL", &v)?;
    }
    if let Some(v) = env("OPENSEARCH_VERIFY_CERTS") {
        backend.verify_certs = parse_bool("OPENSEARCH_VERIFY_CERTS", &v)?;
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be true or false, got '{}'", key, other),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.backend.host.trim().is_empty() {
        bail!("backend.host must not be empty");
    }
    if config.backend.port == 0 {
        bail!("backend.port must be > 0");
    }
    if config.backend.timeout_secs == 0 {
        bail!("backend.timeout_secs must be > 0");
    }

    let indices = &config.indices;
    for (name, pattern) in [
        ("archives", &indices.archives),
        ("alerts", &indices.alerts),
        ("agents", &indices.agents),
    ] {
        if pattern.trim().is_empty() {
            bail!("indices.{} must not be empty", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config_with_env(&tmp.path().join("absent.toml"), no_env).unwrap();
        assert_eq!(cfg.backend.host, "localhost");
        assert_eq!(cfg.backend.port, 9200);
        assert!(cfg.backend.use_ssl);
        assert!(!cfg.backend.verify_certs);
        assert_eq!(cfg.indices.alerts, "wazuh-alerts-*");
        assert_eq!(cfg.search.failure_mode, FailureMode::Lenient);
        assert_eq!(cfg.backend.base_url(), "https://localhost:9200");
    }

    #[test]
    fn test_file_values_are_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wzs.toml");
        std::fs::write(
            &path,
            r#"
[backend]
host = "indexer"
port = 9201
use_ssl = false

[indices]
alerts = "custom-alerts-*"

[search]
failure_mode = "strict"
"#,
        )
        .unwrap();

        let cfg = load_config_with_env(&path, no_env).unwrap();
        assert_eq!(cfg.backend.base_url(), "http://indexer:9201");
        assert_eq!(cfg.indices.alerts, "custom-alerts-*");
        assert_eq!(cfg.indices.archives, "wazuh-archives-*");
        assert_eq!(cfg.search.failure_mode, FailureMode::Strict);
    }

    #[test]
    fn test_env_overrides_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wzs.toml");
        std::fs::write(&path, "[backend]\nhost = \"from-file\"\n").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENSEARCH_HOST", "from-env"),
            ("OPENSEARCH_PORT", "9300"),
            ("OPENSEARCH_USER", "admin"),
            ("OPENSEARCH_PASSWORD", "secret"),
            ("OPENSEARCH_USE_SSL", "false"),
        ]);
        let cfg = load_config_with_env(&path, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.backend.host, "from-env");
        assert_eq!(cfg.backend.port, 9300);
        assert_eq!(cfg.backend.username.as_deref(), Some("admin"));
        assert_eq!(cfg.backend.password.as_deref(), Some("secret"));
        assert!(!cfg.backend.use_ssl);
    }

    #[test]
    fn test_debug_redacts_password() {
        let cfg = BackendConfig {
            username: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", Config { backend: cfg, ..Default::default() });
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("admin"));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let err = load_config_with_env(&path, |k| {
            (k == "OPENSEARCH_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("OPENSEARCH_PORT"));
    }

    #[test]
    fn test_empty_index_pattern_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wzs.toml");
        std::fs::write(&path, "[indices]\nagents = \"\"\n").unwrap();
        let err = load_config_with_env(&path, no_env).unwrap_err();
        assert!(err.to_string().contains("indices.agents"));
    }

    #[test]
    fn test_unknown_failure_mode_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wzs.toml");
        std::fs::write(&path, "[search]\nfailure_mode = \"loud\"\n").unwrap();
        assert!(load_config_with_env(&path, no_env).is_err());
    }
}
