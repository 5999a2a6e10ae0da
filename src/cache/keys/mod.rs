/// 缓存键模块
/// 提供各种缓存键生成函数

// 令牌缓存键模块
pub mod token_keys;

pub use token_keys::{BLACKLIST_PREFIX, blacklist_key};
