use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes,
};

/// 创建主路由，所有路由挂载在 `api_base_uri` 之下
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health::health))
        .route("/users/temporary", post(routes::user::create_temporary));

    let protected_routes = Router::new()
        .route("/users/check-token", get(routes::user::check_token))
        .route("/users/refresh-token", post(routes::user::refresh_token))
        .route("/users/logout", post(routes::user::logout))
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);
    // axum 不允许在根路径 nest
    let router = match state.config.api_base_uri.trim_end_matches('/') {
        "" => api,
        base => Router::new().nest(base, api),
    };
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 开发模式下允许所有来源跨域
    #[cfg(debug_assertions)]
    let router = router.layer(tower_http::cors::CorsLayer::permissive());

    router.with_state(state)
}
