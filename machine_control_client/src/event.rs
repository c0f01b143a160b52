// machine_control_client/src/event.rs

//! 客户端核心对 UI 层的通知面。
//!
//! 本模块集中定义了客户端核心向外层 UI 壳（桌面壳或 Web 前端桥接层）
//! 异步上报状态变化所用的事件常量、负载结构体以及 [`UiNotifier`] trait。
//! 核心自身不做任何渲染：连接状态变化、忙碌指示、需要用户感知的错误
//! 都通过 `UiNotifier` 的副作用调用交给外层展示。
//!
//! 定义的内容包括：
//! - **事件名称常量**: 字符串常量，作为事件的唯一标识符，供外层壳在
//!   转发到前端事件系统时使用。
//! - **事件负载结构体**: 均派生 `serde::Serialize`，以便被序列化为 JSON
//!   发送给前端；同时派生 `Clone` 和 `Debug` 以方便使用。

use log::{error, info, warn};
use serde::Serialize;

/// `ConnectionStatusEvent` (连接状态事件) 的标准事件名称常量。
///
/// 当与控制器的 WebSocket 连接状态发生任何显著变化时
/// (首次尝试连接、成功建立连接、连接意外断开、或主动断开连接后)，
/// 核心会构建 [`ConnectionStatusEvent`] 并通过 `UiNotifier` 上报。
pub const CONNECTION_STATUS_EVENT: &str = "connection_status_v1"; // 版本化事件名，便于未来升级

/// `BusyStateEvent` (忙碌指示事件) 的标准事件名称常量。
///
/// 锁定请求进行期间 UI 应阻塞交互（显示忙碌指示）；收到同命名空间
/// 回复或超时后解除。连接异常断开时忙碌指示会被重新拉起，表示
/// "控制器未就绪"。
pub const BUSY_STATE_EVENT: &str = "busy_state_v1";

/// `UserErrorEvent` (用户可见错误事件) 的标准事件名称常量。
///
/// 可恢复但需要用户感知的故障（请求超时、发送失败、异常断开、权限不足）
/// 通过此事件上报，外层以非模态提示等形式展示。
pub const USER_ERROR_EVENT: &str = "user_error_v1";

/// `AuthRequiredEvent` (需要重新登录事件) 的标准事件名称常量。
///
/// 当控制器以 401 拒绝指令（会话失效）时上报；核心此时已清除本地会话。
pub const AUTH_REQUIRED_EVENT: &str = "auth_required_v1";

/// 连接状态事件的负载结构体。
#[derive(Clone, Serialize, Debug)]
pub struct ConnectionStatusEvent {
    /// 指示当前是否已连接到控制器。
    pub connected: bool,
    /// 当连接失败或意外断开时，描述错误原因的文本信息。
    /// 正常建立连接或预期内的主动断开时为 `None`。
    pub error_message: Option<String>,
}

/// 用户可见错误事件的负载结构体。
#[derive(Clone, Serialize, Debug)]
pub struct UserErrorEvent {
    /// 面向用户的错误描述文本。
    pub message: String,
}

/// 客户端核心对 UI 层的通知接口。
///
/// 外层壳实现此 trait 并在构造 [`crate::ClientContext`] 时注入；
/// 核心保证所有方法都以同步副作用的方式调用，不期待返回值。
/// 实现方不应在回调中执行耗时操作。
pub trait UiNotifier: Send + Sync {
    /// 连接状态发生变化。
    fn connection_status_changed(&self, event: ConnectionStatusEvent);
    /// 忙碌指示变化。`true` 表示 UI 应阻塞交互。
    fn busy_changed(&self, busy: bool);
    /// 出现需要用户感知的可恢复错误。
    fn user_error(&self, event: UserErrorEvent);
    /// 会话已失效，需要用户重新登录。
    fn auth_required(&self);
}

/// 默认的日志通知器：将所有通知写入日志。
///
/// 适用于无 UI 壳的场景（测试、命令行工具）；桌面/Web 壳应提供
/// 自己的实现并转发到其事件系统。
pub struct LogNotifier;

impl UiNotifier for LogNotifier {
    fn connection_status_changed(&self, event: ConnectionStatusEvent) {
        info!(
            "[MachControlClient] 连接状态变化 ({}): connected={}, error={:?}",
            CONNECTION_STATUS_EVENT, event.connected, event.error_message
        );
    }

    fn busy_changed(&self, busy: bool) {
        info!("[MachControlClient] 忙碌指示变化 ({}): busy={}", BUSY_STATE_EVENT, busy);
    }

    fn user_error(&self, event: UserErrorEvent) {
        error!("[MachControlClient] 用户可见错误 ({}): {}", USER_ERROR_EVENT, event.message);
    }

    fn auth_required(&self) {
        warn!("[MachControlClient] 会话已失效，需要重新登录 ({})", AUTH_REQUIRED_EVENT);
    }
}
