use config::{AppConfig, ConfigError, config_path, load_config_from_file};
use tracing_subscriber::{EnvFilter, prelude::*};

const LOG_TARGETS: &[&str] = &["server", "db", "config", "utils"];

fn filter_string(level: &str) -> String {
    let mut filter = String::from("warn");
    for target in LOG_TARGETS {
        filter.push_str(&format!(",{target}={level}"));
    }
    filter
}

/// Installs the global subscriber. `RUST_LOG` sets the level for our crates.
pub fn init_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(filter_string(log_level.trim()))
        .unwrap_or_else(|_| EnvFilter::new(filter_string("info")));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();
}

/// Reads the config file and layers environment overrides on top.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from_file(&config_path())?;
    config.apply_env_overrides();
    if config.uses_default_secret() {
        tracing::warn!("JWT_SECRET is not set; using the built-in development secret");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_covers_each_crate() {
        let filter = filter_string("debug");
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("server=debug"));
        assert!(filter.contains("db=debug"));
        assert!(EnvFilter::try_new(filter).is_ok());
    }
}
