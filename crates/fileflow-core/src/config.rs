//! Process-wide configuration, driven entirely by environment variables.
//!
//! Covers the data directory, database URL (whose scheme selects a
//! persistence backend), admin credentials, JWT secret, and listen port.
//! `Settings` is a separate, store-backed type — see
//! [`crate::model::Settings`].

/// Process-wide configuration loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the combined REST/S3/WebDAV/proxy server listens on.
    pub listen_addr: String,
    /// Directory used for file-based backends (e.g. the default SQLite file).
    pub data_dir: String,
    /// Database URL; its scheme selects the persistence backend.
    ///
    /// One of `sqlite:…`, `libsql://…[?authToken=…]`, `redis://…`,
    /// `mysql://…`, `mongodb://…`, `postgres://…`. Defaults to a SQLite
    /// file under `data_dir` when unset.
    pub database_url: String,
    /// Administrative username, used to mint JWTs via `/auth/login`.
    pub admin_username: String,
    /// Administrative password.
    pub admin_password: String,
    /// Secret used to sign and verify admin JWTs.
    pub jwt_secret: String,
    /// Log level passed to the tracing `EnvFilter` when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_owned(),
            data_dir: "./data".to_owned(),
            database_url: "sqlite://./data/fileflow.db".to_owned(),
            admin_username: "admin".to_owned(),
            admin_password: "admin".to_owned(),
            jwt_secret: "change-me-in-production".to_owned(),
            log_level: "info".to_owned(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = v;
        }
        if let Ok(v) = std::env::var("DATA_DIR") {
            config.data_dir = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            config.database_url = v;
        } else {
            config.database_url = format!("sqlite://{}/fileflow.db", config.data_dir);
        }
        if let Ok(v) = std::env::var("ADMIN_USERNAME") {
            config.admin_username = v;
        }
        if let Ok(v) = std::env::var("ADMIN_PASSWORD") {
            config.admin_password = v;
        }
        if let Ok(v) = std::env::var("JWT_SECRET") {
            config.jwt_secret = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.database_url, "sqlite://./data/fileflow.db");
    }

    #[test]
    fn test_database_url_derives_from_data_dir_when_unset() {
        // SAFETY: test runs single-threaded w.r.t. this env var via serial test harness default.
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
        unsafe {
            std::env::set_var("DATA_DIR", "/tmp/ff-test-data-dir");
        }
        let config = AppConfig::from_env();
        assert_eq!(config.database_url, "sqlite:///tmp/ff-test-data-dir/fileflow.db");
        unsafe {
            std::env::remove_var("DATA_DIR");
        }
    }
}
