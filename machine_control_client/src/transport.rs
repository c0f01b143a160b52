// machine_control_client/src/transport.rs

//! 连接服务模块。
//!
//! `ConnectionService` 负责与控制器之间唯一一条持久 WebSocket 连接的
//! 完整生命周期：连接建立、出站缓冲、锁定请求、心跳维持与关闭处理。
//!
//! # 链路状态
//!
//! `Disconnected → Connecting → Open → Closed(code)`。本服务只上报断开，
//! 不做自动重连；重连时机由外层决定。
//!
//! # 出站缓冲
//!
//! 连接未打开时的发送永不丢弃也永不阻塞调用方：消息按到达顺序进入
//! 出站队列，连接打开后严格按入队顺序冲刷（FIFO），随后清空队列。
//!
//! # 锁定请求
//!
//! `max_locking_time_ms > 0` 的发送会记录"锁定命名空间"并拉起忙碌指示，
//! 直到同命名空间的回复到达或定时器超时，二者恰好发生其一。
//! 同一时刻至多允许一个锁定请求；前一个尚未完成时再次发起锁定发送
//! 属于调用方错误，新锁定会替换旧锁定并记录警告。
//!
//! 发送失败（底层写出错误）会立即清除锁定与定时器并上报用户可见错误，
//! 消息不会重新入队（失败时语义为至多一次）。

use crate::event::{ConnectionStatusEvent, UiNotifier, UserErrorEvent};
use chrono::{DateTime, Utc};
use futures_util::SinkExt;
use log::{debug, error, info, warn};
use machine_ws_utils::client::transport::{connect_client, receive_incoming, Incoming};
use machine_ws_utils::error::LinkError;
use machine_ws_utils::frame::Frame;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;

// 心跳机制相关常量
/// 心跳发送间隔，单位：秒。
const HEARTBEAT_INTERVAL_SECONDS: u64 = 30;
/// 判定 Pong 失联的宽限时间，单位：秒。
/// 心跳只做活性观测并记录警告，从不主动关闭连接。
const PONG_TIMEOUT_SECONDS: u64 = 10;

/// WebSocket 的正常关闭码。携带此关闭码的关闭是预期内的，保持静默；
/// 其他关闭码一律视为异常关闭。
const NORMAL_CLOSE_CODE: u16 = 1000;

/// 入站业务帧的处理回调，由外层在连接时注入（通常转发给指令分发器）。
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// 链路状态机。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// 尚未连接或已显式断开。
    Disconnected,
    /// 连接正在建立。
    Connecting,
    /// 连接已打开，可直接收发。
    Open,
    /// 连接已关闭。`code` 为对方给出的关闭码，意外中断时缺失。
    Closed { code: Option<u16> },
}

/// 连接未打开时排队的一条出站消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedMessage {
    /// 目标命名空间。
    pub namespace: u32,
    /// 负载字节。
    pub payload: Vec<u8>,
    /// 锁定时间（毫秒）。0 表示发后不理；正值表示冲刷时照常进入锁定流程。
    pub max_locking_time_ms: u32,
}

/// 交给连接任务写出端的一项出站内容。
#[derive(Debug)]
pub(crate) enum Outbound {
    /// 一条业务帧。
    Frame(Frame),
    /// 心跳 Ping 控制帧。
    Ping,
    /// 请求发送 Close 帧并结束连接任务（显式断开）。
    Close,
}

/// 一次进行中的锁定请求。
struct LockedRequest {
    namespace: u32,
    /// 代次标识。定时器触发时校验此值，保证"恰好释放一次"：
    /// 被回复释放或被替换后，迟到的定时器不会再动新的锁定。
    generation: u64,
    timeout_task: JoinHandle<()>,
}

/// 锁定状态：至多一个进行中的锁定请求 + 单调递增的代次计数。
/// 定时器任务与服务本体通过 `Arc<Mutex<LockState>>` 共同持有。
#[derive(Default)]
struct LockState {
    request: Option<LockedRequest>,
    generation: u64,
}

/// 连接服务。见模块级文档。
///
/// 实例应放入 `Arc` 中供各组件共享；`connect` 需要 `Arc<Self>` 接收者，
/// 以便把服务自身克隆进后台连接任务。
pub struct ConnectionService {
    notifier: Arc<dyn UiNotifier>,
    link_state: Mutex<LinkState>,
    outbound_buffer: Mutex<VecDeque<BufferedMessage>>,
    lock_state: Arc<Mutex<LockState>>,
    writer_tx: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    connection_task: TokioMutex<Option<JoinHandle<()>>>,
    heartbeat_task: TokioMutex<Option<JoinHandle<()>>>,
    last_pong_received_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl ConnectionService {
    /// 创建连接服务实例。创建后处于 `Disconnected` 状态，
    /// 此时的发送全部进入出站缓冲。
    pub fn new(notifier: Arc<dyn UiNotifier>) -> Self {
        info!("[MachControlClient] ConnectionService: 正在初始化...");
        Self {
            notifier,
            link_state: Mutex::new(LinkState::Disconnected),
            outbound_buffer: Mutex::new(VecDeque::new()),
            lock_state: Arc::new(Mutex::new(LockState::default())),
            writer_tx: Mutex::new(None),
            connection_task: TokioMutex::new(None),
            heartbeat_task: TokioMutex::new(None),
            last_pong_received_at: Arc::new(Mutex::new(None)),
        }
    }

    // --- 状态读取 ---

    /// 当前链路状态。
    pub fn link_state(&self) -> LinkState {
        *self.link_state.lock().unwrap()
    }

    /// 连接是否已打开。
    pub fn is_open(&self) -> bool {
        self.link_state() == LinkState::Open
    }

    /// 当前锁定请求的命名空间，没有进行中的锁定时为 `None`。
    pub fn locked_namespace(&self) -> Option<u32> {
        self.lock_state.lock().unwrap().request.as_ref().map(|r| r.namespace)
    }

    /// 出站缓冲中的消息条数。
    pub fn buffered_count(&self) -> usize {
        self.outbound_buffer.lock().unwrap().len()
    }

    // --- 发送 ---

    /// 发送一条消息到指定命名空间。
    ///
    /// 连接未打开时消息进入出站缓冲并立即返回（永不丢弃、永不阻塞）；
    /// 已打开时立即封帧写出。`max_locking_time_ms > 0` 时进入锁定流程
    /// （见模块级文档）。发送失败不向调用方返回错误，而是通过通知器
    /// 以用户可见错误的形式上报。
    ///
    /// 锁定流程会在 Tokio 运行时上启动定时器任务，因此带锁定时间的
    /// 发送必须在运行时上下文中调用。
    pub fn send(&self, namespace: u32, payload: Vec<u8>, max_locking_time_ms: u32) {
        if !self.is_open() {
            debug!(
                "[MachControlClient] 连接未打开 ({:?})，消息进入出站缓冲 (命名空间: {}, {} 字节, 锁定: {} ms)",
                self.link_state(),
                namespace,
                payload.len(),
                max_locking_time_ms
            );
            self.outbound_buffer.lock().unwrap().push_back(BufferedMessage {
                namespace,
                payload,
                max_locking_time_ms,
            });
            return;
        }
        self.transmit(namespace, payload, max_locking_time_ms);
    }

    /// 立即封帧写出一条消息，按需进入锁定流程。
    fn transmit(&self, namespace: u32, payload: Vec<u8>, max_locking_time_ms: u32) {
        if max_locking_time_ms > 0 {
            self.engage_lock(namespace, max_locking_time_ms);
        }
        let writer = self.writer_tx.lock().unwrap().clone();
        match writer {
            Some(writer) => {
                let frame = Frame::new(namespace, payload);
                if writer.send(Outbound::Frame(frame)).is_err() {
                    self.handle_transmit_failure("发送通道已关闭");
                }
            }
            None => self.handle_transmit_failure("发送通道不可用"),
        }
    }

    /// 记录锁定命名空间、启动超时定时器并拉起忙碌指示。
    ///
    /// 定时器触发与回复释放通过锁内的代次校验保证互斥：
    /// 锁定要么被同命名空间回复释放，要么被超时释放，恰好其一。
    fn engage_lock(&self, namespace: u32, max_locking_time_ms: u32) {
        let mut lock = self.lock_state.lock().unwrap();
        if let Some(previous) = lock.request.take() {
            // 前一个锁定请求尚未完成（调用方错误），新锁定替换旧锁定
            warn!(
                "[MachControlClient] 命名空间 {} 的锁定请求尚未完成，已被命名空间 {} 的新锁定替换。",
                previous.namespace, namespace
            );
            previous.timeout_task.abort();
        }
        lock.generation += 1;
        let generation = lock.generation;

        let lock_state = Arc::clone(&self.lock_state);
        let notifier = Arc::clone(&self.notifier);
        // 定时器在持有锁的情况下启动：即使它立即被调度，也要等本次
        // 锁定记录写入后才能拿到锁做超时检查
        let timeout_task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(u64::from(max_locking_time_ms))).await;
            let released = {
                let mut lock = lock_state.lock().unwrap();
                match &lock.request {
                    Some(request) if request.generation == generation => {
                        lock.request = None;
                        true
                    }
                    _ => false,
                }
            };
            if released {
                warn!(
                    "[MachControlClient] 命名空间 {} 的锁定请求在 {} ms 内没有收到回复，已超时。",
                    namespace, max_locking_time_ms
                );
                notifier.user_error(UserErrorEvent {
                    message: format!("控制器未响应 ({} ms 内没有收到回复)，请稍后重试。", max_locking_time_ms),
                });
                notifier.busy_changed(false);
            }
        });
        lock.request = Some(LockedRequest {
            namespace,
            generation,
            timeout_task,
        });
        drop(lock);

        self.notifier.busy_changed(true);
    }

    /// 若存在匹配命名空间的锁定请求则将其释放（取消定时器、清除忙碌指示）。
    ///
    /// 由指令分发器在入站帧交给监听器之前调用。返回是否确实释放了锁定。
    pub fn release_lock_if_matching(&self, namespace: u32) -> bool {
        let taken = {
            let mut lock = self.lock_state.lock().unwrap();
            match &lock.request {
                Some(request) if request.namespace == namespace => lock.request.take(),
                _ => None,
            }
        };
        match taken {
            Some(request) => {
                debug!("[MachControlClient] 收到命名空间 {} 的回复，锁定请求已释放。", namespace);
                request.timeout_task.abort();
                self.notifier.busy_changed(false);
                true
            }
            None => false,
        }
    }

    /// 无条件清除进行中的锁定请求（若有），不上报错误。
    /// 用于发送失败与连接结束时的清理。返回是否清除了锁定。
    fn clear_pending_lock(&self) -> bool {
        let taken = { self.lock_state.lock().unwrap().request.take() };
        match taken {
            Some(request) => {
                request.timeout_task.abort();
                self.notifier.busy_changed(false);
                true
            }
            None => false,
        }
    }

    /// 处理发送失败：清除锁定与定时器并上报用户可见错误。消息不重新入队。
    fn handle_transmit_failure(&self, detail: &str) {
        error!("[MachControlClient] 消息发送失败: {}", detail);
        self.clear_pending_lock();
        self.notifier.user_error(UserErrorEvent {
            message: format!("消息发送失败: {}", detail),
        });
    }

    // --- 连接生命周期 ---

    /// 连接到指定的控制器端点。
    ///
    /// 本方法只负责安排后台连接任务：实际的连接成败、断开与错误
    /// 全部通过通知器异步上报。若已有连接任务在运行会先将其取消。
    /// 入站业务帧交给 `frame_handler` 处理（锁定释放由分发器负责）。
    pub async fn connect(self: Arc<Self>, url: String, frame_handler: FrameHandler) {
        info!("[MachControlClient] ConnectionService::connect 调用，目标 URL: {}", url);

        // 取消之前的连接任务（若有）
        {
            let mut task_guard = self.connection_task.lock().await;
            if let Some(handle) = task_guard.take() {
                info!("[MachControlClient] 检测到之前的连接任务正在运行，正在取消...");
                handle.abort();
                match handle.await {
                    Ok(_) => info!("[MachControlClient] 之前的连接任务已结束。"),
                    Err(e) if e.is_cancelled() => info!("[MachControlClient] 之前的连接任务已被取消。"),
                    Err(e) => warn!("[MachControlClient] 等待之前的连接任务结束时发生错误: {:?}", e),
                }
            }
        }
        self.abort_heartbeat().await;
        *self.writer_tx.lock().unwrap() = None;
        self.clear_pending_lock();
        *self.link_state.lock().unwrap() = LinkState::Connecting;

        let service = Arc::clone(&self);
        let task = tokio::spawn(async move {
            service.run_connection(url, frame_handler).await;
        });
        *self.connection_task.lock().await = Some(task);
    }

    /// 后台连接任务主体：建立连接、冲刷缓冲、循环收发直到连接结束。
    async fn run_connection(self: Arc<Self>, url: String, frame_handler: FrameHandler) {
        info!("[MachControlClient] (连接任务) 开始连接控制器: {}", url);
        let connection = match connect_client(url.clone()).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("[MachControlClient] (连接任务) 连接控制器失败: {}", e);
                *self.link_state.lock().unwrap() = LinkState::Disconnected;
                self.notifier.connection_status_changed(ConnectionStatusEvent {
                    connected: false,
                    error_message: Some(format!("连接控制器失败: {}", e)),
                });
                return;
            }
        };
        let mut ws_sender = connection.ws_sender;
        let mut ws_receiver = connection.ws_receiver;

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        *self.last_pong_received_at.lock().unwrap() = Some(Utc::now());
        self.on_link_opened(outbound_tx.clone());

        let heartbeat = tokio::spawn(run_heartbeat_loop(
            outbound_tx,
            Arc::clone(&self.last_pong_received_at),
        ));
        *self.heartbeat_task.lock().await = Some(heartbeat);

        let mut close_code: Option<u16> = None;
        let mut final_error: Option<String> = None;
        let mut explicit_close = false;

        loop {
            tokio::select! {
                outbound = outbound_rx.recv() => match outbound {
                    Some(Outbound::Frame(frame)) => {
                        if let Err(e) = ws_sender.send(Message::Binary(frame.encode())).await {
                            self.handle_transmit_failure(&e.to_string());
                        }
                    }
                    Some(Outbound::Ping) => {
                        if let Err(e) = ws_sender.send(Message::Ping(Vec::new())).await {
                            debug!("[MachControlClient] (连接任务) 发送心跳 Ping 失败: {}", e);
                        }
                    }
                    Some(Outbound::Close) => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        explicit_close = true;
                        break;
                    }
                    None => {
                        explicit_close = true;
                        break;
                    }
                },
                incoming = receive_incoming(&mut ws_receiver) => match incoming {
                    Some(Ok(Incoming::Frame(frame))) => frame_handler(frame),
                    Some(Ok(Incoming::Pong)) => {
                        *self.last_pong_received_at.lock().unwrap() = Some(Utc::now());
                    }
                    Some(Ok(Incoming::Closed { code })) => {
                        info!("[MachControlClient] (连接任务) 收到 Close 帧，关闭码: {:?}", code);
                        close_code = code;
                        if code != Some(NORMAL_CLOSE_CODE) {
                            final_error = Some(match code {
                                Some(c) => format!("连接被控制器异常关闭 (关闭码 {})", c),
                                None => "连接被控制器关闭且未附带关闭码".to_string(),
                            });
                        }
                        break;
                    }
                    Some(Err(LinkError::FrameTooShort { actual })) => {
                        warn!("[MachControlClient] (连接任务) 入站帧过短 ({} 字节)，已丢弃。", actual);
                    }
                    Some(Err(LinkError::Message(detail))) => {
                        warn!("[MachControlClient] (连接任务) 收到不符合协议的消息，已丢弃: {}", detail);
                    }
                    Some(Err(e)) => {
                        error!("[MachControlClient] (连接任务) 接收消息时发生错误: {}", e);
                        final_error = Some(format!("接收消息时发生错误: {}", e));
                        break;
                    }
                    None => {
                        warn!("[MachControlClient] (连接任务) WebSocket 接收流已意外结束。");
                        final_error = Some("与控制器的连接已意外中断".to_string());
                        break;
                    }
                }
            }
        }

        // --- 连接结束处理 ---
        self.abort_heartbeat().await;
        *self.writer_tx.lock().unwrap() = None;
        self.clear_pending_lock();

        if explicit_close {
            // 显式断开：状态与事件由 disconnect() 负责
            debug!("[MachControlClient] (连接任务) 显式断开，连接任务退出。");
            return;
        }

        *self.link_state.lock().unwrap() = LinkState::Closed { code: close_code };
        match final_error {
            None => {
                info!("[MachControlClient] (连接任务) 连接已正常关闭。");
                self.notifier.connection_status_changed(ConnectionStatusEvent {
                    connected: false,
                    error_message: None,
                });
            }
            Some(message) => {
                error!("[MachControlClient] (连接任务) 连接异常结束: {}", message);
                self.notifier.user_error(UserErrorEvent { message: message.clone() });
                // 控制器未就绪，重新拉起忙碌指示
                self.notifier.busy_changed(true);
                self.notifier.connection_status_changed(ConnectionStatusEvent {
                    connected: false,
                    error_message: Some(message),
                });
            }
        }
    }

    /// 连接打开时的处理：登记写出通道、上报状态，然后按入队顺序
    /// 冲刷出站缓冲并清空队列。
    pub(crate) fn on_link_opened(&self, writer: mpsc::UnboundedSender<Outbound>) {
        *self.link_state.lock().unwrap() = LinkState::Open;
        *self.writer_tx.lock().unwrap() = Some(writer);
        self.notifier.connection_status_changed(ConnectionStatusEvent {
            connected: true,
            error_message: None,
        });
        self.notifier.busy_changed(false);

        let queued: Vec<BufferedMessage> = self.outbound_buffer.lock().unwrap().drain(..).collect();
        if !queued.is_empty() {
            info!(
                "[MachControlClient] 连接已打开，按入队顺序冲刷 {} 条缓冲消息。",
                queued.len()
            );
        }
        for message in queued {
            self.transmit(message.namespace, message.payload, message.max_locking_time_ms);
        }
    }

    /// 主动断开连接（预期内的正常关闭，保持静默，不上报用户可见错误）。
    pub async fn disconnect(&self) {
        info!("[MachControlClient] ConnectionService::disconnect 调用。");
        *self.link_state.lock().unwrap() = LinkState::Disconnected;
        self.clear_pending_lock();

        // 请求连接任务发送 Close 帧并自行退出
        let writer = self.writer_tx.lock().unwrap().take();
        if let Some(writer) = writer {
            let _ = writer.send(Outbound::Close);
        }
        self.abort_heartbeat().await;

        let handle = self.connection_task.lock().await.take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(Duration::from_secs(2), &mut handle).await {
                Ok(Ok(_)) => info!("[MachControlClient] 连接任务已结束。"),
                Ok(Err(e)) if e.is_cancelled() => info!("[MachControlClient] 连接任务已被取消。"),
                Ok(Err(e)) => warn!("[MachControlClient] 等待连接任务结束时发生错误: {:?}", e),
                Err(_) => {
                    warn!("[MachControlClient] 等待连接任务结束超时，强制中止。");
                    handle.abort();
                }
            }
        }

        self.notifier.connection_status_changed(ConnectionStatusEvent {
            connected: false,
            error_message: None,
        });
    }

    /// 中止心跳任务（若在运行）。
    async fn abort_heartbeat(&self) {
        if let Some(handle) = self.heartbeat_task.lock().await.take() {
            handle.abort();
        }
    }
}

/// 心跳任务主体：周期性发送 Ping 并观测 Pong 活性。
///
/// 活性异常只记录警告，不关闭连接；任务在写出通道关闭后自行退出。
async fn run_heartbeat_loop(
    writer: mpsc::UnboundedSender<Outbound>,
    last_pong_received_at: Arc<Mutex<Option<DateTime<Utc>>>>,
) {
    info!(
        "[MachControlClient] (心跳任务) 已启动，每 {} 秒发送一次 Ping。",
        HEARTBEAT_INTERVAL_SECONDS
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECONDS));
    ticker.tick().await; // 第一次 tick 立即完成，跳过
    loop {
        ticker.tick().await;
        let last_pong = *last_pong_received_at.lock().unwrap();
        if let Some(last_pong) = last_pong {
            let silent_seconds = Utc::now().signed_duration_since(last_pong).num_seconds();
            if silent_seconds > (HEARTBEAT_INTERVAL_SECONDS + PONG_TIMEOUT_SECONDS) as i64 {
                warn!(
                    "[MachControlClient] (心跳任务) 已 {} 秒未收到 Pong，链路可能不健康。",
                    silent_seconds
                );
            }
        }
        if writer.send(Outbound::Ping).is_err() {
            debug!("[MachControlClient] (心跳任务) 发送通道已关闭，心跳任务退出。");
            break;
        }
    }
}
