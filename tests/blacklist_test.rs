mod common;

use std::time::Duration;

use futures_util::future::join_all;
use reservation_backend::cache::{
    CacheConnection, CacheConnector, CacheError, ConnectionManager, ConnectionState, ExpiryMode,
    FailurePolicy, MemoryCache, RetryPolicy, TokenBlacklist, keys::blacklist_key,
};

use common::{SlowFirstConnect, blacklist_on};

async fn wait_until_connected(blacklist: &TokenBlacklist) {
    for _ in 0..100 {
        if blacklist.manager().is_connected() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("cache never reconnected");
}

#[tokio::test(start_paused = true)]
async fn blacklisted_token_is_reported_until_expiry() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::default());

    assert!(blacklist.blacklist_token("abc123", 2).await);
    assert!(blacklist.is_token_blacklisted("abc123").await);

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(!blacklist.is_token_blacklisted("abc123").await);
}

#[tokio::test]
async fn first_blacklist_call_connects_on_demand() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::default());
    assert_eq!(blacklist.manager().state(), ConnectionState::Disconnected);

    assert!(blacklist.blacklist_token("t-1", 60).await);
    assert_eq!(blacklist.manager().state(), ConnectionState::Connected);
    assert_eq!(cache.connect_calls(), 1);
    assert!(cache.contains_key("blacklist:t-1"));
}

#[tokio::test]
async fn unknown_token_is_not_blacklisted() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::default());
    blacklist.manager().initialize().await;

    assert!(!blacklist.is_token_blacklisted("never-seen").await);
}

#[tokio::test]
async fn only_the_exact_marker_counts() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::default());
    blacklist.manager().initialize().await;

    let conn = cache.connect().await.unwrap();
    conn.set(&blacklist_key("odd"), "TRUE").await.unwrap();
    conn.set("odd", "true").await.unwrap();

    assert!(!blacklist.is_token_blacklisted("odd").await);
}

#[tokio::test]
async fn invalid_arguments_are_rejected() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::default());

    assert!(!blacklist.blacklist_token("", 60).await);
    assert!(!blacklist.blacklist_token("t", 0).await);
    assert!(!blacklist.is_token_blacklisted("").await);
    // 参数错误不会触发连接
    assert_eq!(cache.connect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn unreachable_cache_fails_open() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::default());
    assert!(blacklist.blacklist_token("revoked", 60).await);

    cache.set_reachable(false);

    assert!(!blacklist.is_token_blacklisted("revoked").await);
    assert!(!blacklist.blacklist_token("another", 60).await);
    assert!(!cache.contains_key("blacklist:another"));
}

#[tokio::test(start_paused = true)]
async fn unreachable_cache_fails_closed_when_configured() {
    let cache = MemoryCache::new();
    cache.set_reachable(false);
    let blacklist = blacklist_on(&cache, RetryPolicy::default())
        .with_failure_policy(FailurePolicy::Closed);

    assert!(blacklist.is_token_blacklisted("anything").await);
    assert!(!blacklist.blacklist_token("anything", 60).await);
}

#[tokio::test]
async fn dropped_connection_gives_false_negative_then_recovers() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::default());
    assert!(blacklist.blacklist_token("revoked", 600).await);

    cache.drop_connections();

    // 重连窗口内立即返回 false，同时在后台重连
    assert!(!blacklist.is_token_blacklisted("revoked").await);
    wait_until_connected(&blacklist).await;
    assert!(blacklist.is_token_blacklisted("revoked").await);
    assert_eq!(cache.connect_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn connection_error_schedules_reconnect() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::fixed(Duration::from_secs(5)));
    let manager = blacklist.manager().clone();
    assert!(manager.initialize().await);

    cache.set_reachable(false);
    manager.report_error(&CacheError::ConnectionFailure("connection reset".into()));

    assert_eq!(manager.state(), ConnectionState::Error);
    assert!(manager.reconnect_pending());
    assert!(!blacklist.blacklist_token("during-outage", 30).await);

    cache.set_reachable(true);
    manager
        .subscribe()
        .wait_for(|state| *state == ConnectionState::Connected)
        .await
        .unwrap();

    assert!(blacklist.blacklist_token("after-outage", 30).await);
    assert!(blacklist.is_token_blacklisted("after-outage").await);
}

#[tokio::test(start_paused = true)]
async fn write_during_outage_schedules_reconnect() {
    let cache = MemoryCache::new();
    let blacklist = blacklist_on(&cache, RetryPolicy::fixed(Duration::from_secs(1)));
    assert!(blacklist.blacklist_token("t", 30).await);

    cache.set_reachable(false);
    assert!(!blacklist.blacklist_token("t2", 30).await);
    assert!(blacklist.manager().reconnect_pending());

    cache.set_reachable(true);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(blacklist.manager().is_connected());
}

#[tokio::test(start_paused = true)]
async fn both_expiry_modes_bound_the_entry_lifetime() {
    for mode in [ExpiryMode::Atomic, ExpiryMode::SetThenExpire] {
        let cache = MemoryCache::new();
        let blacklist = blacklist_on(&cache, RetryPolicy::default()).with_expiry_mode(mode);

        assert!(blacklist.blacklist_token("tok", 30).await);
        assert_eq!(
            cache.ttl("blacklist:tok"),
            Some(Some(Duration::from_secs(30))),
            "{:?}",
            mode
        );
    }
}

#[tokio::test(start_paused = true)]
async fn cancelled_connect_does_not_wedge_the_manager() {
    let cache = MemoryCache::new();
    let connector = SlowFirstConnect::new(&cache, Duration::from_secs(3600));
    let manager = ConnectionManager::new(connector, RetryPolicy::fixed(Duration::from_secs(5)));
    let blacklist =
        TokenBlacklist::new(manager.clone()).with_failure_policy(FailurePolicy::Closed);

    // 调用方在连接完成前放弃，例如 HTTP 客户端断开
    let check = tokio::time::timeout(
        Duration::from_secs(1),
        blacklist.is_token_blacklisted("t"),
    )
    .await;
    assert!(check.is_err());
    assert_eq!(manager.state(), ConnectionState::Error);
    assert!(manager.reconnect_pending());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(manager.is_connected());
    assert!(manager.initialize().await);
    assert!(blacklist.blacklist_token("t", 60).await);
    assert_eq!(manager.connect_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_connect_attempt() {
    let cache = MemoryCache::new();
    let connector = SlowFirstConnect::new(&cache, Duration::from_millis(200));
    let blacklist = TokenBlacklist::new(ConnectionManager::new(
        connector,
        RetryPolicy::default(),
    ));

    let tokens: Vec<String> = (0..8).map(|i| format!("token-{}", i)).collect();
    let writes = join_all(tokens.iter().map(|t| blacklist.blacklist_token(t, 60)));
    let (written, checked) = tokio::join!(writes, blacklist.is_token_blacklisted("token-0"));

    assert!(written.iter().all(|ok| *ok));
    // 连接建立前的检查按默认策略放行
    assert!(!checked);
    assert_eq!(cache.connect_calls(), 1);
    assert_eq!(blacklist.manager().connect_attempts(), 1);

    for token in &tokens {
        assert!(blacklist.is_token_blacklisted(token).await);
    }
    assert_eq!(cache.connect_calls(), 1);
}
