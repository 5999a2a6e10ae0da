use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AppError, utils::verify_token};

/// 请求携带的原始令牌，注销和刷新时需要
#[derive(Debug, Clone)]
pub struct AuthToken(pub String);

/// 校验 Bearer 令牌并拒绝已注销的令牌
///
/// 通过后把 [`crate::utils::Claims`] 和 [`AuthToken`] 放入请求扩展。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_token(&token, &state.config).map_err(|e| {
        tracing::debug!("Token verification failed: {}", e);
        AppError::InvalidToken
    })?;

    if state.blacklist.is_token_blacklisted(&token).await {
        tracing::info!("Rejected revoked token for user {}", claims.sub);
        return Err(AppError::TokenRevoked);
    }

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(AuthToken(token));
    Ok(next.run(req).await)
}
