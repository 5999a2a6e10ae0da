//! 缓存后端抽象
//! 连接管理器只依赖这里的两个 trait，生产环境使用 Redis，测试与本地开发使用内存实现
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::cache::error::CacheResult;

pub mod memory;
pub mod redis_store;

pub use self::memory::MemoryCache;
pub use self::redis_store::RedisConnector;

/// 已建立的缓存连接
pub trait CacheConnection: Send + Sync {
    /// 连接是否仍然可用
    fn is_open(&self) -> bool;

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, CacheResult<()>>;

    /// 单条命令写入并设置过期时间（SET key value EX seconds）
    fn set_ex<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        seconds: u64,
    ) -> BoxFuture<'a, CacheResult<()>>;

    fn expire<'a>(&'a self, key: &'a str, seconds: u64) -> BoxFuture<'a, CacheResult<()>>;

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<Option<String>>>;
}

/// 负责打开新连接
pub trait CacheConnector: Send + Sync {
    /// 用于日志输出的地址
    fn endpoint(&self) -> String;

    fn connect(&self) -> BoxFuture<'_, CacheResult<Arc<dyn CacheConnection>>>;
}

/// 根据地址选择后端：`memory://` 使用进程内缓存，其余按 Redis 地址处理
pub fn connector_for_url(url: &str) -> CacheResult<Arc<dyn CacheConnector>> {
    if url.starts_with(memory::MEMORY_SCHEME) {
        Ok(Arc::new(MemoryCache::new()))
    } else {
        Ok(Arc::new(RedisConnector::open(url)?))
    }
}
