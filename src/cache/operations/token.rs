use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::cache::backend::CacheConnection;
use crate::cache::connection::ConnectionManager;
use crate::cache::error::CacheResult;
use crate::cache::keys::blacklist_key;

/// 黑名单标记值，只有值完全一致才视为已拉黑
pub const BLACKLIST_MARKER: &str = "true";

/// 无法确认令牌状态时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 视为未拉黑，并在后台重连
    #[default]
    Open,
    /// 等待一次重连，仍不可用则视为已拉黑
    Closed,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "fail-open" => Ok(FailurePolicy::Open),
            "closed" | "fail-closed" => Ok(FailurePolicy::Closed),
            other => Err(format!("unknown failure policy `{}`", other)),
        }
    }
}

/// 写入黑名单时设置过期时间的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryMode {
    /// SET key value EX seconds
    #[default]
    Atomic,
    /// SET 之后再 EXPIRE；两条命令之间进程崩溃会留下永不过期的键
    SetThenExpire,
}

impl FromStr for ExpiryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(ExpiryMode::Atomic),
            "set-then-expire" | "set_then_expire" | "two-step" => Ok(ExpiryMode::SetThenExpire),
            other => Err(format!("unknown expiry mode `{}`", other)),
        }
    }
}

/// 令牌黑名单
///
/// 所有操作在边界处吞掉错误并返回布尔值；出现连接错误时交给 [`ConnectionManager`] 重连。
pub struct TokenBlacklist {
    manager: Arc<ConnectionManager>,
    failure_policy: FailurePolicy,
    expiry_mode: ExpiryMode,
}

impl TokenBlacklist {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            failure_policy: FailurePolicy::default(),
            expiry_mode: ExpiryMode::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_expiry_mode(mut self, mode: ExpiryMode) -> Self {
        self.expiry_mode = mode;
        self
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// 将令牌加入黑名单，`expiry_secs` 秒后自动失效
    ///
    /// 没有可用连接时先等待一次重新初始化。任何失败都返回 `false`。
    pub async fn blacklist_token(&self, token: &str, expiry_secs: u64) -> bool {
        if token.is_empty() {
            warn!("Refusing to blacklist an empty token");
            return false;
        }
        if expiry_secs == 0 {
            warn!("Refusing to blacklist token {} without expiry", short(token));
            return false;
        }

        let Some(conn) = self.ensure_connection().await else {
            warn!(
                "Cache unavailable, token {} not blacklisted",
                short(token)
            );
            return false;
        };

        let key = blacklist_key(token);
        match self.write_marker(conn.as_ref(), &key, expiry_secs).await {
            Ok(()) => {
                debug!(
                    "Blacklisted token {} for {}s",
                    short(token),
                    expiry_secs
                );
                true
            }
            Err(e) => {
                error!("Failed to blacklist token {}: {}", short(token), e);
                self.manager.report_error(&e);
                false
            }
        }
    }

    /// 令牌是否在黑名单中
    ///
    /// 连接不可用时的结果由 [`FailurePolicy`] 决定：默认立即返回 `false` 并在后台重连。
    pub async fn is_token_blacklisted(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        let conn = match self.manager.connection() {
            Some(conn) => conn,
            None => match self.failure_policy {
                FailurePolicy::Open => {
                    debug!("Cache unavailable, treating token as not blacklisted");
                    self.manager.initialize_in_background();
                    return false;
                }
                FailurePolicy::Closed => match self.ensure_connection().await {
                    Some(conn) => conn,
                    None => {
                        warn!("Cache unavailable, treating token as blacklisted");
                        return true;
                    }
                },
            },
        };

        match conn.get(&blacklist_key(token)).await {
            Ok(value) => value.as_deref() == Some(BLACKLIST_MARKER),
            Err(e) => {
                error!("Failed to check token {}: {}", short(token), e);
                self.manager.report_error(&e);
                self.failure_policy == FailurePolicy::Closed
            }
        }
    }

    async fn ensure_connection(&self) -> Option<Arc<dyn CacheConnection>> {
        if let Some(conn) = self.manager.connection() {
            return Some(conn);
        }
        self.manager.initialize().await;
        self.manager.connection()
    }

    async fn write_marker(
        &self,
        conn: &dyn CacheConnection,
        key: &str,
        expiry_secs: u64,
    ) -> CacheResult<()> {
        match self.expiry_mode {
            ExpiryMode::Atomic => conn.set_ex(key, BLACKLIST_MARKER, expiry_secs).await,
            ExpiryMode::SetThenExpire => {
                conn.set(key, BLACKLIST_MARKER).await?;
                conn.expire(key, expiry_secs).await
            }
        }
    }
}

/// 日志中只输出令牌前缀
fn short(token: &str) -> &str {
    match token.char_indices().nth(8) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policies() {
        assert_eq!("open".parse::<FailurePolicy>(), Ok(FailurePolicy::Open));
        assert_eq!("Fail-Closed".parse::<FailurePolicy>(), Ok(FailurePolicy::Closed));
        assert!("maybe".parse::<FailurePolicy>().is_err());

        assert_eq!("atomic".parse::<ExpiryMode>(), Ok(ExpiryMode::Atomic));
        assert_eq!(
            "set-then-expire".parse::<ExpiryMode>(),
            Ok(ExpiryMode::SetThenExpire)
        );
    }

    #[test]
    fn log_prefix_is_truncated() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(short("eyJhbGciOiJIUzI1NiJ9"), "eyJhbGci");
    }
}
