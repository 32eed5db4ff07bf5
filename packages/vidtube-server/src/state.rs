use std::sync::Arc;
use std::time::Instant;

use crate::accounts::AccountService;
use crate::auth::{SessionManager, TokenConfig, TokenIssuer};
use crate::config::ServerConfig;
use crate::media::MediaHost;
use crate::storage::UserStore;

/// Main server state shared across all handlers
pub struct ServerState {
    pub config: ServerConfig,
    pub user_store: Arc<dyn UserStore>,
    pub sessions: SessionManager,
    pub accounts: AccountService,
    pub start_time: Instant,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        user_store: Arc<dyn UserStore>,
        media_host: Arc<dyn MediaHost>,
    ) -> Self {
        let tokens = TokenIssuer::new(TokenConfig::from_server_config(&config));
        let sessions = SessionManager::new(user_store.clone(), tokens);
        let accounts = AccountService::new(user_store.clone(), media_host);

        Self {
            config,
            user_store,
            sessions,
            accounts,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
