use std::sync::Arc;

use cache::{CacheConnector, ConnectionManager, TokenBlacklist};
use config::Config;

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub blacklist: Arc<TokenBlacklist>,
}

impl AppState {
    /// 按配置组装连接管理器与黑名单服务，连接由调用方决定何时建立
    pub fn new(config: Config, connector: Arc<dyn CacheConnector>) -> Self {
        let manager = ConnectionManager::new(connector, config.cache_retry.clone());
        let blacklist = TokenBlacklist::new(manager)
            .with_failure_policy(config.blacklist_failure_policy)
            .with_expiry_mode(config.blacklist_expiry_mode);
        Self {
            config,
            blacklist: Arc::new(blacklist),
        }
    }
}
