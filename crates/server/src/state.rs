use std::sync::Arc;

use config::AppConfig;
use db::DBService;
use utils_jwt::TokenService;

/// Shared handler state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<AppConfig>,
    tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(db: DBService, config: AppConfig) -> Self {
        let tokens = TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);
        Self {
            db,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}
