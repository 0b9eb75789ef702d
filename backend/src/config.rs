//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults. Everything is read once at startup.

use std::env;
use std::fmt;
use std::time::Duration;

/// A credential that must never appear in logs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
    /// NiFi connection configuration
    pub nifi: NifiConfig,
    /// Data sources and sinks wired into flow arguments
    pub sources: SourcesConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// SQLite database path or `sqlite:` URL
    pub database_url: String,
}

/// NiFi connection configuration
#[derive(Debug, Clone)]
pub struct NifiConfig {
    /// Base URL of the NiFi REST API
    pub url: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: Secret,
    /// Verify the NiFi TLS certificate (NiFi ships self-signed by default)
    pub verify_tls: bool,
    /// Timeout applied to every request
    pub request_timeout: Duration,
    /// How often the background task renews the access token
    pub token_renewal: Duration,
    /// Delay between startup login attempts
    pub login_retry_delay: Duration,
    /// Startup login attempts before giving up
    pub login_max_attempts: u32,
    /// Delay between polls while waiting for a state transition
    pub state_poll_interval: Duration,
    /// Polls before a state transition is reported as stuck
    pub state_poll_attempts: u32,
}

impl Default for NifiConfig {
    fn default() -> Self {
        Self {
            url: "https://nifi:8443/nifi-api".to_string(),
            username: String::new(),
            password: Secret::default(),
            verify_tls: false,
            request_timeout: Duration::from_secs(30),
            token_renewal: Duration::from_secs(3600),
            login_retry_delay: Duration::from_secs(10),
            login_max_attempts: 12,
            state_poll_interval: Duration::from_millis(500),
            state_poll_attempts: 60,
        }
    }
}

/// Endpoints and credentials injected into flow arguments
#[derive(Debug, Clone, Default)]
pub struct SourcesConfig {
    /// Site identifier used when a record carries none
    pub site_id: Option<String>,
    /// Prometheus query endpoint, e.g. `http://prometheus:9090/api/v1/query`
    pub prometheus_uri: Option<String>,
    /// Kafka bootstrap endpoint
    pub kafka_endpoint: Option<String>,
    /// NDAC endpoint polled for UE identifiers
    pub ndac_get_uri: Option<String>,
    /// NDAC endpoint queried for UE location details
    pub ndac_post_uri: Option<String>,
    /// Credential sent with NDAC requests
    pub ndac_password: Option<Secret>,
    /// Password of the keystore used by TLS controller services
    pub keystore_password: Option<Secret>,
}

/// Read a variable, treating empty values as unset
fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let nifi_defaults = NifiConfig::default();
        Self {
            server: ServerConfig {
                port: env_parse("PORT", 8080),
                host: env_opt("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            },
            persistence: PersistenceConfig {
                database_url: env_opt("DATABASE_URL").unwrap_or_else(|| {
                    if let Some(home) = env::var_os("HOME") {
                        format!("{}/.telemetry-orchestrator/records.db", home.to_string_lossy())
                    } else {
                        ".telemetry-orchestrator/records.db".to_string()
                    }
                }),
            },
            nifi: NifiConfig {
                url: env_opt("NIFI_URI").unwrap_or(nifi_defaults.url),
                username: env_opt("NIFI_USERNAME").unwrap_or_default(),
                password: Secret::new(env_opt("NIFI_PASSWORD").unwrap_or_default()),
                verify_tls: env_parse("NIFI_VERIFY_TLS", nifi_defaults.verify_tls),
                request_timeout: Duration::from_secs(env_parse(
                    "NIFI_REQUEST_TIMEOUT_SECS",
                    nifi_defaults.request_timeout.as_secs(),
                )),
                token_renewal: Duration::from_secs(env_parse(
                    "NIFI_TOKEN_RENEWAL_SECS",
                    nifi_defaults.token_renewal.as_secs(),
                )),
                login_retry_delay: Duration::from_secs(env_parse(
                    "NIFI_LOGIN_RETRY_DELAY_SECS",
                    nifi_defaults.login_retry_delay.as_secs(),
                )),
                login_max_attempts: env_parse(
                    "NIFI_LOGIN_MAX_ATTEMPTS",
                    nifi_defaults.login_max_attempts,
                ),
                state_poll_interval: Duration::from_millis(env_parse(
                    "NIFI_STATE_POLL_MS",
                    nifi_defaults.state_poll_interval.as_millis() as u64,
                )),
                state_poll_attempts: env_parse(
                    "NIFI_STATE_POLL_ATTEMPTS",
                    nifi_defaults.state_poll_attempts,
                ),
            },
            sources: SourcesConfig {
                site_id: env_opt("SITE_ID"),
                prometheus_uri: env_opt("PROMETHEUS_URI"),
                kafka_endpoint: env_opt("KAFKA_ENDPOINT"),
                ndac_get_uri: env_opt("NDAC_URI_GET"),
                ndac_post_uri: env_opt("NDAC_URI_POST"),
                ndac_password: env_opt("NDAC_PASSWORD").map(Secret::new),
                keystore_password: env_opt("KEYSTORE_PASSWORD").map(Secret::new),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
