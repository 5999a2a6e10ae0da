use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub user_id: String,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub token: String,
    pub expires_at: i64,
    /// 旧令牌是否已成功注销
    pub previous_revoked: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckTokenResponse {
    pub user_id: String,
    pub is_temporary: bool,
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub user_id: String,
    /// 黑名单条目的存活秒数
    pub revoked_for_secs: u64,
}
