use std::str::FromStr;
use std::time::Duration;

/// 重连退避方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 每次等待相同时长
    Fixed,
    /// 每次翻倍，直到上限
    Exponential,
}

impl FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Backoff::Fixed),
            "exponential" | "exp" => Ok(Backoff::Exponential),
            other => Err(format!("unknown backoff `{}`", other)),
        }
    }
}

/// 缓存重连策略
///
/// 默认策略为固定 5 秒间隔、不限次数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
    /// `None` 表示无限重试
    pub max_attempts: Option<u32>,
}

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            max_delay: delay,
            backoff: Backoff::Fixed,
            max_attempts: None,
        }
    }

    pub fn exponential(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            backoff: Backoff::Exponential,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// 第 `attempt` 次重连（从 1 开始）之前需要等待的时长，策略耗尽时返回 `None`
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return Some(Duration::ZERO);
        }
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }

        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay
                    .checked_mul(factor)
                    .unwrap_or(self.max_delay)
                    .min(self.max_delay)
            }
        };
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_five_seconds_forever() {
        let policy = RetryPolicy::default();
        for attempt in [1, 2, 10, 1_000, u32::MAX] {
            assert_eq!(policy.delay_for(attempt), Some(Duration::from_secs(5)));
        }
    }

    #[test]
    fn exponential_doubles_until_capped() {
        let policy = RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(10));
        let delays: Vec<_> = (1..=6)
            .map(|n| policy.delay_for(n).map(|d| d.as_secs()))
            .collect();
        assert_eq!(
            delays,
            vec![Some(1), Some(2), Some(4), Some(8), Some(10), Some(10)]
        );
        assert_eq!(policy.delay_for(200), Some(Duration::from_secs(10)));
    }

    #[test]
    fn bounded_policy_gives_up() {
        let policy = RetryPolicy::fixed(Duration::from_millis(100)).with_max_attempts(3);
        assert!(policy.delay_for(3).is_some());
        assert_eq!(policy.delay_for(4), None);
    }

    #[test]
    fn parses_backoff_names() {
        assert_eq!("Fixed".parse::<Backoff>(), Ok(Backoff::Fixed));
        assert_eq!("exponential".parse::<Backoff>(), Ok(Backoff::Exponential));
        assert!("linear".parse::<Backoff>().is_err());
    }
}
