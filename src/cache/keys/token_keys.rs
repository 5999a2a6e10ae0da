/// 令牌黑名单缓存键前缀
pub const BLACKLIST_PREFIX: &str = "blacklist:";

/// 生成令牌黑名单缓存键
pub fn blacklist_key(token: &str) -> String {
    format!("{}{}", BLACKLIST_PREFIX, token)
}
