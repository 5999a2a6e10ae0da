//! 进程内缓存
//!
//! 过期时间基于 tokio 时钟，测试中可以通过 `tokio::time::pause` / `advance` 快进。
//! 支持模拟缓存服务不可达，用于验证重连与降级行为。
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

use super::{CacheConnection, CacheConnector};
use crate::cache::error::{CacheError, CacheResult};

pub const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
struct MemoryInner {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    reachable: AtomicBool,
    /// 每次断开连接时递增，旧连接据此失效
    generation: AtomicU64,
    connect_calls: AtomicU64,
}

/// 进程内缓存，克隆后共享同一份数据
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                entries: Mutex::new(HashMap::new()),
                reachable: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                connect_calls: AtomicU64::new(0),
            }),
        }
    }

    /// 设置缓存服务是否可达；设为不可达时同时断开所有已有连接
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
        if !reachable {
            self.drop_connections();
        }
    }

    /// 断开所有已有连接，数据保留
    pub fn drop_connections(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// 累计的连接尝试次数（包括失败的）
    pub fn connect_calls(&self) -> u64 {
        self.inner.connect_calls.load(Ordering::SeqCst)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// 键的剩余存活时间；键不存在返回 `None`，键没有过期时间返回 `Some(None)`
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let now = Instant::now();
        self.entries()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at.map(|at| at.saturating_duration_since(now)))
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, MemoryEntry>> {
        // 锁内不会 panic，中毒时直接沿用数据
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheConnector for MemoryCache {
    fn endpoint(&self) -> String {
        MEMORY_SCHEME.to_string()
    }

    fn connect(&self) -> BoxFuture<'_, CacheResult<Arc<dyn CacheConnection>>> {
        Box::pin(async move {
            self.inner.connect_calls.fetch_add(1, Ordering::SeqCst);
            if !self.inner.reachable.load(Ordering::SeqCst) {
                return Err(CacheError::ConnectionFailure(
                    "memory cache unreachable".to_string(),
                ));
            }
            Ok(Arc::new(MemoryConnection {
                cache: self.clone(),
                generation: self.inner.generation.load(Ordering::SeqCst),
            }) as Arc<dyn CacheConnection>)
        })
    }
}

struct MemoryConnection {
    cache: MemoryCache,
    generation: u64,
}

impl MemoryConnection {
    fn ensure_open(&self) -> CacheResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CacheError::ConnectionFailure(
                "memory connection closed".to_string(),
            ))
        }
    }
}

impl CacheConnection for MemoryConnection {
    fn is_open(&self) -> bool {
        self.cache.inner.reachable.load(Ordering::SeqCst)
            && self.cache.inner.generation.load(Ordering::SeqCst) == self.generation
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async move {
            self.ensure_open()?;
            // SET 会清除原有的过期时间
            self.cache.entries().insert(
                key.to_string(),
                MemoryEntry {
                    value: value.to_string(),
                    expires_at: None,
                },
            );
            Ok(())
        })
    }

    fn set_ex<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        seconds: u64,
    ) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async move {
            self.ensure_open()?;
            if seconds == 0 {
                return Err(CacheError::CommandFailure(
                    "invalid expire time in 'set' command".to_string(),
                ));
            }
            self.cache.entries().insert(
                key.to_string(),
                MemoryEntry {
                    value: value.to_string(),
                    expires_at: Some(Instant::now() + Duration::from_secs(seconds)),
                },
            );
            Ok(())
        })
    }

    fn expire<'a>(&'a self, key: &'a str, seconds: u64) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async move {
            self.ensure_open()?;
            let now = Instant::now();
            let mut entries = self.cache.entries();
            let expired = entries.get(key).is_some_and(|entry| entry.is_expired(now));
            if expired {
                entries.remove(key);
            } else if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = Some(now + Duration::from_secs(seconds));
            }
            // 与 Redis 一致：键不存在时 EXPIRE 不报错
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<Option<String>>> {
        Box::pin(async move {
            self.ensure_open()?;
            let now = Instant::now();
            let mut entries = self.cache.entries();
            let value = entries
                .get(key)
                .filter(|entry| !entry.is_expired(now))
                .map(|entry| entry.value.clone());
            if value.is_none() {
                entries.remove(key);
            }
            Ok(value)
        })
    }
}
