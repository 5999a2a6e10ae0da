// 缓存模块
// 包含缓存连接管理、重连策略与令牌黑名单

pub mod backend;
pub mod connection;
pub mod error;
pub mod keys;
pub mod operations;
pub mod retry;

// 重新导出常用类型，方便其他模块使用
pub use backend::{CacheConnection, CacheConnector, MemoryCache, RedisConnector, connector_for_url};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{CacheError, CacheResult};
pub use operations::{ExpiryMode, FailurePolicy, TokenBlacklist};
pub use retry::{Backoff, RetryPolicy};
