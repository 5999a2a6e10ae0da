/// 缓存操作
/// 提供缓存操作的功能实现

// 令牌黑名单
pub mod token;

pub use token::{BLACKLIST_MARKER, ExpiryMode, FailurePolicy, TokenBlacklist};
