use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::utils::error_codes;

#[derive(Debug)]
pub enum AppError {
    /// 缺少或格式错误的 Authorization 头
    Unauthorized,
    /// 签名无效或已过期
    InvalidToken,
    /// 令牌已被注销
    TokenRevoked,
    /// 黑名单写入失败，调用方可以重试
    CacheUnavailable,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "未授权访问",
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "令牌无效或已过期",
            ),
            AppError::TokenRevoked => (
                StatusCode::UNAUTHORIZED,
                error_codes::TOKEN_REVOKED,
                "令牌已注销",
            ),
            AppError::CacheUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_codes::CACHE_UNAVAILABLE,
                "缓存服务不可用，请稍后重试",
            ),
        };

        let body = Json(ErrorResponse {
            code,
            error_message: error_message.to_string(),
        });

        (status, body).into_response()
    }
}
