use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "APP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadConfig {
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub upload: UploadConfig,
    pub auth: AuthConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data.db?mode=rwc".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            upload: UploadConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses a JSON config, keeping defaults for anything missing or invalid.
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str::<AppConfig>(raw) {
            Ok(config) => config.normalized(),
            Err(err) => {
                tracing::warn!("Failed to parse config ({err}); using defaults");
                AppConfig::default()
            }
        }
    }

    fn normalized(mut self) -> Self {
        let defaults = AppConfig::default();
        self.upload.allowed_extensions = self
            .upload
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if self.upload.allowed_extensions.is_empty() {
            self.upload.allowed_extensions = defaults.upload.allowed_extensions;
        }
        if self.upload.max_bytes == 0 {
            self.upload.max_bytes = defaults.upload.max_bytes;
        }
        if self.auth.token_ttl_hours == 0 {
            self.auth.token_ttl_hours = defaults.auth.token_ttl_hours;
        }
        if self.auth.jwt_secret.trim().is_empty() {
            self.auth.jwt_secret = defaults.auth.jwt_secret;
        }
        self
    }

    /// Applies `DATABASE_URL`, `HOST`, `BACKEND_PORT`/`PORT`, `JWT_SECRET` and `UPLOAD_DIR`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = read("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(host) = read("HOST") {
            self.host = host;
        }
        if let Some(raw) = read("BACKEND_PORT").or_else(|| read("PORT")) {
            match raw.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(err) => tracing::warn!(value = %raw, error = %err, "Ignoring invalid port"),
            }
        }
        if let Some(secret) = read("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(dir) = read("UPLOAD_DIR") {
            self.upload.dir = PathBuf::from(dir);
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.auth.jwt_secret == DEFAULT_JWT_SECRET
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads the config file, returning defaults when it does not exist.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::info!("No config file at {}; using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(AppConfig::from_raw(&raw))
}

pub fn save_config_to_file(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let raw = serde_json::to_string_pretty(config)?;
    std::fs::write(path, raw)?;
    Ok(())
}

pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn from_raw_fills_missing_sections() {
        let config = AppConfig::from_raw(r#"{"port": 8080}"#);
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.upload.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.auth.token_ttl_hours, 24);
    }

    #[test]
    fn from_raw_invalid_json_falls_back_to_defaults() {
        assert_eq!(AppConfig::from_raw("{not json"), AppConfig::default());
    }

    #[test]
    fn from_raw_normalizes_upload_policy() {
        let config = AppConfig::from_raw(
            r#"{"upload": {"allowed_extensions": [".PNG", " Jpg ", ""], "max_bytes": 0}}"#,
        );
        assert_eq!(config.upload.allowed_extensions, vec!["png", "jpg"]);
        assert_eq!(config.upload.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.upload.allows_extension("PNG"));
        assert!(!config.upload.allows_extension("gif"));
    }

    #[test]
    fn env_overrides_apply_and_skip_invalid_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "sqlite::memory:"),
            ("PORT", "not-a-port"),
            ("JWT_SECRET", "s3cret"),
            ("UPLOAD_DIR", "/tmp/images"),
            ("HOST", "  "),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|value| value.to_string()));

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.upload.dir, PathBuf::from("/tmp/images"));
        assert!(!config.uses_default_secret());
    }

    #[test]
    fn backend_port_wins_over_port() {
        let vars: HashMap<&str, &str> = HashMap::from([("BACKEND_PORT", "7000"), ("PORT", "9000")]);
        let mut config = AppConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|value| value.to_string()));
        assert_eq!(config.bind_address(), "127.0.0.1:7000");
    }

    #[test]
    fn load_missing_file_returns_defaults_and_save_round_trips() {
        let dir = test_support::TempRoot::new("config");
        let path = dir.path().join("config.json");
        assert_eq!(load_config_from_file(&path).unwrap(), AppConfig::default());

        let mut config = AppConfig::default();
        config.port = 6123;
        save_config_to_file(&config, &path).unwrap();
        assert_eq!(load_config_from_file(&path).unwrap().port, 6123);
    }
}
