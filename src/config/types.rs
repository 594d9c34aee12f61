// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub mail: MailConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Application behaviour
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub name: String,
    /// Key signing session cookies
    pub secret_key: String,
    /// Where `/redirect` sends clients
    pub redirect_target: String,
    pub session_cookie_name: String,
    pub csrf_enabled: bool,
    /// Receives a mail whenever a new user name is recorded
    #[serde(default)]
    pub admin_email: Option<String>,
}

/// Store location
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Outbound mail settings
#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub sender: String,
    pub subject_prefix: String,
}
