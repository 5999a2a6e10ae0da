#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use futures_util::future::BoxFuture;
use reservation_backend::{
    AppState,
    cache::{
        CacheConnection, CacheConnector, CacheResult, ConnectionManager, MemoryCache, RetryPolicy,
        TokenBlacklist,
    },
    config::Config,
    router::create_router,
};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn config_with(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("JWT_SECRET".into(), TEST_SECRET.into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub fn blacklist_on(cache: &MemoryCache, retry: RetryPolicy) -> TokenBlacklist {
    TokenBlacklist::new(ConnectionManager::new(Arc::new(cache.clone()), retry))
}

/// 第一次连接要等待 `first_delay`，之后的连接直接交给内存缓存
pub struct SlowFirstConnect {
    cache: MemoryCache,
    first_delay: Duration,
    delayed: AtomicBool,
}

impl SlowFirstConnect {
    pub fn new(cache: &MemoryCache, first_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            cache: cache.clone(),
            first_delay,
            delayed: AtomicBool::new(false),
        })
    }
}

impl CacheConnector for SlowFirstConnect {
    fn endpoint(&self) -> String {
        self.cache.endpoint()
    }

    fn connect(&self) -> BoxFuture<'_, CacheResult<Arc<dyn CacheConnection>>> {
        Box::pin(async move {
            if !self.delayed.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(self.first_delay).await;
            }
            self.cache.connect().await
        })
    }
}

/// 基于内存缓存的应用，返回路由与状态
pub async fn app_with(cache: &MemoryCache, extra: &[(&str, &str)]) -> (Router, AppState) {
    let state = AppState::new(config_with(extra), Arc::new(cache.clone()));
    state.blacklist.manager().initialize().await;
    (create_router(state.clone()), state)
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("router is infallible");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token)
}

pub fn post(uri: &str, token: Option<&str>) -> Request<Body> {
    request("POST", uri, token)
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("valid request")
}

/// 申请一个临时令牌
pub async fn temporary_token(app: &Router) -> String {
    let (status, body) = send(app, post("/api/users/temporary", None)).await;
    assert_eq!(status, StatusCode::OK);
    body["resp_data"]["token"]
        .as_str()
        .expect("token in response")
        .to_string()
}
