use thiserror::Error;

/// 缓存层错误
///
/// 所有错误在黑名单服务的公开接口处被转换为布尔结果，不会继续向上传播。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// 无法建立连接，或连接已断开
    #[error("cache connection failure: {0}")]
    ConnectionFailure(String),

    /// 连接正常但命令执行失败
    #[error("cache command failure: {0}")]
    CommandFailure(String),
}

impl CacheError {
    /// 连接类错误需要触发重连
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, CacheError::ConnectionFailure(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            CacheError::ConnectionFailure(err.to_string())
        } else {
            CacheError::CommandFailure(err.to_string())
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
