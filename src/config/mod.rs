// Configuration module entry point
// Loads layered configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{
    AppConfig, Config, DatabaseConfig, HttpConfig, LoggingConfig, MailConfig, PerformanceConfig,
    ServerConfig,
};

/// Secret used when none is configured; startup warns about it
pub const DEV_SECRET_KEY: &str = "dev-secret-change-me";

impl Config {
    /// Load configuration from the given file path (without extension).
    ///
    /// Layers, lowest first: defaults, the optional file, `WEBTOUR_*`
    /// environment variables (nested keys joined by `__`, e.g.
    /// `WEBTOUR_SERVER__PORT`), then `MAIL_USERNAME` / `MAIL_PASSWORD`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("WEBTOUR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "webtour/0.1")?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("app.name", "webtour")?
            .set_default("app.secret_key", DEV_SECRET_KEY)?
            .set_default("app.redirect_target", "https://www.youtube.com.br")?
            .set_default("app.session_cookie_name", "session")?
            .set_default("app.csrf_enabled", true)?
            .set_default("database.path", "store.redb")?
            .set_default("mail.server", "smtp.googlemail.com")?
            .set_default("mail.port", 587)?
            .set_default("mail.use_tls", true)?
            .set_default("mail.sender", "webtour@localhost")?
            .set_default("mail.subject_prefix", "[webtour] ")?
            .set_override_option("mail.username", std::env::var("MAIL_USERNAME").ok())?
            .set_override_option("mail.password", std::env::var("MAIL_PASSWORD").ok())?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.app.secret_key == DEV_SECRET_KEY
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            workers: None,
        },
        performance: PerformanceConfig {
            keep_alive_timeout: 75,
            read_timeout: 30,
            write_timeout: 30,
            max_connections: None,
        },
        http: HttpConfig {
            server_name: "webtour-test".to_string(),
            max_body_size: 1024,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            access_log: false,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        },
        app: AppConfig {
            name: "webtour".to_string(),
            secret_key: "test-secret".to_string(),
            redirect_target: "https://www.youtube.com.br".to_string(),
            session_cookie_name: "session".to_string(),
            csrf_enabled: true,
            admin_email: Some("admin@example.com".to_string()),
        },
        database: DatabaseConfig {
            path: "unused.redb".to_string(),
        },
        mail: MailConfig {
            server: "localhost".to_string(),
            port: 25,
            use_tls: false,
            username: None,
            password: None,
            sender: "webtour@localhost".to_string(),
            subject_prefix: "[webtour] ".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("does-not-exist/webtour").unwrap();
        assert_eq!(cfg.app.redirect_target, "https://www.youtube.com.br");
        assert_eq!(cfg.app.session_cookie_name, "session");
        assert_eq!(cfg.mail.port, 587);
        assert!(cfg.performance.max_connections.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("webtour-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[app]\nredirect_target = \"https://example.org\"\n",
        )
        .unwrap();

        let stem = dir.join("custom");
        let cfg = Config::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.app.redirect_target, "https://example.org");
        assert_eq!(cfg.server.host, "127.0.0.1");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_socket_addr() {
        let mut cfg = test_config();
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 5000);
        cfg.server.host = "not a host".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }
}
