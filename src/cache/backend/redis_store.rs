use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient, RedisResult};

use super::{CacheConnection, CacheConnector};
use crate::cache::error::{CacheError, CacheResult};

/// Redis 连接器
pub struct RedisConnector {
    client: RedisClient,
    url: String,
}

impl RedisConnector {
    pub fn open(url: &str) -> CacheResult<Self> {
        let client = RedisClient::open(url)
            .map_err(|e| CacheError::ConnectionFailure(format!("invalid redis url: {}", e)))?;
        Ok(Self {
            client,
            url: redact(url),
        })
    }
}

/// 日志与健康检查中隐藏地址里的密码
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

impl CacheConnector for RedisConnector {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    fn connect(&self) -> BoxFuture<'_, CacheResult<Arc<dyn CacheConnection>>> {
        Box::pin(async move {
            let conn = self.client.get_multiplexed_async_connection().await?;
            Ok(Arc::new(RedisConnection {
                conn,
                open: AtomicBool::new(true),
            }) as Arc<dyn CacheConnection>)
        })
    }
}

/// 多路复用连接，命令在客户端内部排队，克隆即可并发使用
struct RedisConnection {
    conn: MultiplexedConnection,
    open: AtomicBool,
}

impl RedisConnection {
    /// 连接类错误出现后把连接标记为不可用，由连接管理器负责重连
    fn track<T>(&self, result: RedisResult<T>) -> CacheResult<T> {
        result.map_err(|e| {
            let err = CacheError::from(e);
            if err.is_connection_failure() {
                self.open.store(false, Ordering::SeqCst);
            }
            err
        })
    }
}

impl CacheConnection for RedisConnection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let result: RedisResult<()> = conn.set(key, value).await;
            self.track(result)
        })
    }

    fn set_ex<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        seconds: u64,
    ) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let result: RedisResult<()> = conn.set_ex(key, value, seconds).await;
            self.track(result)
        })
    }

    fn expire<'a>(&'a self, key: &'a str, seconds: u64) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
            let result: RedisResult<()> = conn.expire(key, seconds).await;
            self.track(result)
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<Option<String>>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let result: RedisResult<Option<String>> = conn.get(key).await;
            self.track(result)
        })
    }
}
