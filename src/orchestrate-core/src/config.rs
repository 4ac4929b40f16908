use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host queried when none is configured
pub const DEFAULT_API_HOST: &str = "api.cl1.orchestrate.io";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    /// Name of the environment variable holding the API token
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Maximum number of search results the proxy returns per request
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_enabled")]
    pub enabled: bool,
    /// `*` allows any origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_cors_enabled() -> bool {
    true
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_cors_enabled(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Settings for the default pooled HTTP transport
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Idle connections kept per host. Kept small to limit load on the
    /// service's load balancer.
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// How long establishing a connection may take
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,

    /// How long to wait for response data before abandoning the call
    #[serde(default = "default_response_header_timeout_ms")]
    pub response_header_timeout_ms: u64,
}

fn default_max_idle_per_host() -> usize {
    4
}

fn default_dial_timeout_ms() -> u64 {
    3_000
}

fn default_response_header_timeout_ms() -> u64 {
    3_000
}

impl TransportConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_millis(self.response_header_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_max_idle_per_host(),
            dial_timeout_ms: default_dial_timeout_ms(),
            response_header_timeout_ms: default_response_header_timeout_ms(),
        }
    }
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_auth_token_env() -> String {
    "ORC_KEY".to_string()
}

fn default_port() -> String {
    "8080".to_string()
}

fn default_static_dir() -> String {
    "./static".to_string()
}

fn default_search_limit() -> usize {
    100
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Read the API token from the configured environment variable
    pub fn auth_token(&self) -> Option<String> {
        std::env::var(&self.auth_token_env).ok()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            auth_token_env: default_auth_token_env(),
            port: default_port(),
            static_dir: default_static_dir(),
            search_limit: default_search_limit(),
            cors: CorsConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}
