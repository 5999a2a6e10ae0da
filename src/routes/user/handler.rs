use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    middleware::AuthToken,
    utils::{
        Claims, error_codes, error_to_api_response, generate_temp_token, generate_token,
        success_to_api_response,
    },
};

use super::model::{CheckTokenResponse, CreateUserResponse, LogoutResponse, RefreshTokenResponse};

#[axum::debug_handler]
pub async fn create_temporary(State(state): State<AppState>) -> impl IntoResponse {
    // 生成随机用户ID
    let user_id = uuid::Uuid::new_v4().to_string();

    match generate_temp_token(&user_id, &state.config) {
        Ok((token, expires_at)) => (
            StatusCode::OK,
            success_to_api_response(CreateUserResponse {
                user_id,
                token,
                expires_at,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to sign temp token: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "生成临时令牌失败".to_string()),
            )
        }
    }
}

/// 中间件已完成签名与黑名单校验，这里直接返回
#[axum::debug_handler]
pub async fn check_token(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    (
        StatusCode::OK,
        success_to_api_response(CheckTokenResponse {
            user_id: claims.sub,
            is_temporary: claims.is_temp,
            expires_at: claims.exp,
        }),
    )
}

/// 注销当前令牌，黑名单条目保留到令牌原本的过期时间
#[axum::debug_handler]
pub async fn logout(
    Extension(claims): Extension<Claims>,
    Extension(AuthToken(token)): Extension<AuthToken>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let remaining = claims.remaining_secs();
    // 已经过期的令牌无需记录
    if remaining > 0 && !state.blacklist.blacklist_token(&token, remaining).await {
        return Err(AppError::CacheUnavailable);
    }

    tracing::info!("User {} logged out", claims.sub);
    Ok((
        StatusCode::OK,
        success_to_api_response(LogoutResponse {
            user_id: claims.sub,
            revoked_for_secs: remaining,
        }),
    ))
}

/// 签发新令牌并注销旧令牌；旧令牌注销失败不影响新令牌的签发
#[axum::debug_handler]
pub async fn refresh_token(
    Extension(claims): Extension<Claims>,
    Extension(AuthToken(token)): Extension<AuthToken>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // 根据用户类型使用对应的token生成函数
    let token_result = if claims.is_temp {
        generate_temp_token(&claims.sub, &state.config)
    } else {
        generate_token(&claims.sub, &state.config)
    };

    let (new_token, expires_at) = match token_result {
        Ok(issued) => issued,
        Err(e) => {
            tracing::error!("Failed to sign refreshed token: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "刷新令牌失败".to_string()),
            );
        }
    };

    let remaining = claims.remaining_secs();
    let previous_revoked =
        remaining == 0 || state.blacklist.blacklist_token(&token, remaining).await;
    if !previous_revoked {
        tracing::warn!("Previous token of user {} could not be revoked", claims.sub);
    }

    (
        StatusCode::OK,
        success_to_api_response(RefreshTokenResponse {
            token: new_token,
            expires_at,
            previous_revoked,
        }),
    )
}
