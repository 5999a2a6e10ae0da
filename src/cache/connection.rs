//! 缓存连接管理
//!
//! 持有唯一的缓存连接句柄。连接失败不会向调用方报错，也不会结束进程，
//! 而是按照注入的 [`RetryPolicy`] 在后台重连。
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::backend::{CacheConnection, CacheConnector};
use super::error::CacheError;
use super::retry::RetryPolicy;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ConnectionManager {
    connector: Arc<dyn CacheConnector>,
    retry: RetryPolicy,
    handle: RwLock<Option<Arc<dyn CacheConnection>>>,
    state: watch::Sender<ConnectionState>,
    reconnect_pending: AtomicBool,
    connect_attempts: AtomicU64,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn CacheConnector>, retry: RetryPolicy) -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            connector,
            retry,
            handle: RwLock::new(None),
            state,
            reconnect_pending: AtomicBool::new(false),
            connect_attempts: AtomicU64::new(0),
        })
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// 是否有后台重连任务在运行
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending.load(Ordering::SeqCst)
    }

    /// 累计发起的连接次数
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// 返回可用的连接句柄；句柄不存在或已断开时返回 `None`
    pub fn connection(&self) -> Option<Arc<dyn CacheConnection>> {
        if self.state() != ConnectionState::Connected {
            return None;
        }
        self.read_handle().filter(|conn| conn.is_open())
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    /// 尝试建立连接
    ///
    /// 失败时记录日志并安排后台重连，不向调用方返回错误。
    /// 已有连接尝试进行中时不会重复发起，而是等待该次尝试结束。返回调用结束时是否已连接。
    pub async fn initialize(self: &Arc<Self>) -> bool {
        if self.is_connected() {
            return true;
        }
        if !self.begin_connect() {
            debug!("Cache connection attempt already in progress, waiting for it");
            let mut states = self.subscribe();
            let settled = states
                .wait_for(|state| *state != ConnectionState::Connecting)
                .await
                .is_ok();
            return settled && self.is_connected();
        }
        self.connect_once().await
    }

    /// 在后台发起连接，不等待结果
    pub fn initialize_in_background(self: &Arc<Self>) {
        let this = Arc::clone(self);
        spawn_detached(async move {
            this.initialize().await;
        });
    }

    /// 上报连接类错误，丢弃当前句柄并安排重连
    pub fn report_error(self: &Arc<Self>, err: &CacheError) {
        if err.is_connection_failure() {
            self.on_error(err);
        }
    }

    /// 主动断开，用于进程退出
    pub fn disconnect(&self) {
        self.write_handle(None);
        self.state.send_replace(ConnectionState::Disconnected);
        info!("Cache connection closed");
    }

    fn begin_connect(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                false
            } else {
                *state = ConnectionState::Connecting;
                true
            }
        })
    }

    /// 调用前状态必须已由 `begin_connect` 置为 `Connecting`
    async fn connect_once(self: &Arc<Self>) -> bool {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let mut attempt = PendingConnect {
            manager: self,
            settled: false,
        };
        let result = self.connector.connect().await;
        attempt.settled = true;
        match result {
            Ok(conn) => {
                self.on_connect(conn);
                true
            }
            Err(err) => {
                self.on_error(&err);
                false
            }
        }
    }

    fn on_connect(&self, conn: Arc<dyn CacheConnection>) {
        self.write_handle(Some(conn));
        self.state.send_replace(ConnectionState::Connected);
        info!("Connected to cache at {}", self.connector.endpoint());
    }

    fn on_error(self: &Arc<Self>, err: &CacheError) {
        self.write_handle(None);
        self.state.send_replace(ConnectionState::Error);
        error!("Cache connection error ({}): {}", self.connector.endpoint(), err);
        self.schedule_reconnect();
    }

    fn on_reconnecting(&self, attempt: u32) {
        info!(
            "Reconnecting to cache at {} (attempt {})",
            self.connector.endpoint(),
            attempt
        );
    }

    /// 同一时间只保留一个重连任务
    fn schedule_reconnect(self: &Arc<Self>) {
        if self.reconnect_pending.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        if !spawn_detached(this.reconnect_loop()) {
            self.reconnect_pending.store(false, Ordering::SeqCst);
        }
    }

    async fn reconnect_loop(self: Arc<Self>) {
        let mut attempt: u32 = 0;
        let mut exhausted = false;
        loop {
            attempt = attempt.saturating_add(1);
            let Some(delay) = self.retry.delay_for(attempt) else {
                warn!(
                    "Giving up reconnecting to cache at {} after {} attempts",
                    self.connector.endpoint(),
                    attempt - 1
                );
                exhausted = true;
                break;
            };
            tokio::time::sleep(delay).await;

            if self.is_connected() {
                break;
            }
            if !self.begin_connect() {
                continue;
            }
            self.on_reconnecting(attempt);
            if self.connect_once().await {
                break;
            }
        }
        self.end_reconnect_loop(exhausted);
    }

    /// 退出重连任务；退出前上报的错误会被 `schedule_reconnect` 忽略，所以清除标记后需要再检查一次
    fn end_reconnect_loop(self: &Arc<Self>, exhausted: bool) {
        self.reconnect_pending.store(false, Ordering::SeqCst);
        if !exhausted && self.state() == ConnectionState::Error {
            debug!("Cache error reported while reconnect loop was exiting, rescheduling");
            self.schedule_reconnect();
        }
    }

    fn read_handle(&self) -> Option<Arc<dyn CacheConnection>> {
        match self.handle.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write_handle(&self, conn: Option<Arc<dyn CacheConnection>>) {
        match self.handle.write() {
            Ok(mut guard) => *guard = conn,
            Err(poisoned) => *poisoned.into_inner() = conn,
        }
    }
}

/// 一次进行中的连接尝试
///
/// 调用方的 future 在连接完成前被丢弃时，把状态从 `Connecting` 改回 `Error` 并安排重连，
/// 否则后续的 `initialize` 会一直等待一个不存在的连接尝试。
struct PendingConnect<'a> {
    manager: &'a Arc<ConnectionManager>,
    settled: bool,
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let abandoned = self.manager.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Error;
                true
            } else {
                false
            }
        });
        if abandoned {
            warn!(
                "Cache connection attempt to {} was cancelled",
                self.manager.connector.endpoint()
            );
            self.manager.schedule_reconnect();
        }
    }
}

/// 没有运行时的情况下无法安排后台任务，只记录日志
fn spawn_detached<F>(future: F) -> bool
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
            true
        }
        Err(_) => {
            warn!("No tokio runtime available, cache reconnect not scheduled");
            false
        }
    }
}
