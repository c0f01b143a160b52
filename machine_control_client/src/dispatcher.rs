// machine_control_client/src/dispatcher.rs

//! 指令分发与入站帧路由模块。
//!
//! `Dispatcher` 承担两个方向的职责：
//! - **出站**: 将领域指令 ([`ClientCommand`]) 包入信封、附加请求标识
//!   与会话令牌，序列化为 JSON 后经连接服务发送到配方管理命名空间；
//! - **入站**: 将已解封的帧按命名空间路由给注册的监听器，调用顺序为
//!   注册顺序；路由前先释放匹配命名空间上的锁定请求。
//!
//! 没有监听器的命名空间上到达的帧记录日志后丢弃，不影响其他命名空间。
//! 监听器按注册句柄的标识退订，退订后立即停止接收事件。

use crate::error::ClientError;
use crate::state::StateStore;
use crate::transport::ConnectionService;
use common_models::ws_payloads::{ClientCommand, CommandEnvelope, RECIPE_NAMESPACE};
use log::{debug, warn};
use machine_ws_utils::frame::Frame;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 命名空间监听器回调：参数为 `(命名空间, 负载字节)`。
pub type ListenerCallback = Arc<dyn Fn(u32, &[u8]) + Send + Sync>;

/// 监听器注册句柄，退订时使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerRegistration(Uuid);

/// 指令分发器。见模块级文档。
pub struct Dispatcher {
    transport: Arc<ConnectionService>,
    state: Arc<StateStore>,
    listeners: Mutex<HashMap<u32, Vec<(Uuid, ListenerCallback)>>>,
    /// 发送指令时未显式指定锁定时间的调用方使用的默认值（毫秒）。
    default_lock_timeout_ms: u32,
}

impl Dispatcher {
    /// 创建指令分发器。
    pub fn new(
        transport: Arc<ConnectionService>,
        state: Arc<StateStore>,
        default_lock_timeout_ms: u32,
    ) -> Self {
        Self {
            transport,
            state,
            listeners: Mutex::new(HashMap::new()),
            default_lock_timeout_ms,
        }
    }

    // --- 监听器管理 ---

    /// 把监听器注册到一个或多个命名空间上，返回退订句柄。
    ///
    /// 同一命名空间上的监听器按注册顺序被调用。注册是幂等的：
    /// 同一个回调实例在同一命名空间上重复注册只生效一次。
    pub fn register_listener(
        &self,
        listener: ListenerCallback,
        namespaces: &[u32],
    ) -> ListenerRegistration {
        let id = Uuid::new_v4();
        let mut listeners = self.listeners.lock().unwrap();
        for &namespace in namespaces {
            let list = listeners.entry(namespace).or_default();
            if list.iter().any(|(_, existing)| Arc::ptr_eq(existing, &listener)) {
                debug!(
                    "[MachControlClient] 监听器已注册在命名空间 {} 上，跳过重复注册。",
                    namespace
                );
                continue;
            }
            list.push((id, Arc::clone(&listener)));
        }
        debug!(
            "[MachControlClient] 监听器 {} 已注册到命名空间 {:?}。",
            id, namespaces
        );
        ListenerRegistration(id)
    }

    /// 按句柄标识把监听器从所有命名空间列表中移除。
    ///
    /// 退订立即生效：之后到达的帧不会再交给该监听器。句柄无效时静默忽略。
    pub fn unregister_listener(&self, registration: ListenerRegistration) {
        let mut listeners = self.listeners.lock().unwrap();
        for list in listeners.values_mut() {
            list.retain(|(id, _)| *id != registration.0);
        }
        listeners.retain(|_, list| !list.is_empty());
        debug!("[MachControlClient] 监听器 {} 已退订。", registration.0);
    }

    // --- 出站指令 ---

    /// 发送一条领域指令到配方管理命名空间。
    ///
    /// 指令被包入 [`CommandEnvelope`]：生成请求标识，并从状态存储读取
    /// 当前会话令牌附加到信封上。需认证的指令在令牌缺失时仍然发送
    /// （由控制器拒绝），但记录一条警告；只读指令按"有则附带"处理。
    ///
    /// `max_locking_time_ms` 为 `None` 时使用配置的默认锁定超时；
    /// `Some(0)` 表示发后不理。
    pub fn send_command(
        &self,
        command: ClientCommand,
        max_locking_time_ms: Option<u32>,
    ) -> Result<(), ClientError> {
        let session_token = self.state.session().map(|session| session.token);
        if command.requires_auth() && session_token.is_none() {
            warn!(
                "[MachControlClient] 指令 '{}' 需要会话令牌，但当前没有会话。仍将发送，由控制器拒绝。",
                command.wire_name()
            );
        }
        let wire_name = command.wire_name();
        let envelope = CommandEnvelope {
            command,
            request_id: Some(Uuid::new_v4().to_string()),
            session_token,
        };
        let payload = serde_json::to_vec(&envelope).map_err(|e| {
            ClientError::SerializationError(format!("序列化指令 '{}' 失败: {}", wire_name, e))
        })?;

        let lock_ms = max_locking_time_ms.unwrap_or(self.default_lock_timeout_ms);
        debug!(
            "[MachControlClient] 发送指令 '{}' (命名空间: {}, 锁定: {} ms)",
            wire_name, RECIPE_NAMESPACE, lock_ms
        );
        self.transport.send(RECIPE_NAMESPACE, payload, lock_ms);
        Ok(())
    }

    // --- 入站路由 ---

    /// 处理一条已解封的入站帧。
    ///
    /// 先释放匹配命名空间上的锁定请求（若有），再按注册顺序调用该
    /// 命名空间的全部监听器。没有监听器时记录日志并丢弃，从不 panic，
    /// 其他命名空间的监听器不受影响。
    pub fn on_frame_received(&self, frame: &Frame) {
        // 锁定释放先于监听器调用
        self.transport.release_lock_if_matching(frame.namespace);

        // 先克隆出监听器列表再逐个调用，回调执行期间不持有注册表锁，
        // 监听器因此可以在回调内安全地退订自己
        let listeners: Vec<ListenerCallback> = {
            let registry = self.listeners.lock().unwrap();
            match registry.get(&frame.namespace) {
                Some(list) if !list.is_empty() => {
                    list.iter().map(|(_, listener)| Arc::clone(listener)).collect()
                }
                _ => {
                    debug!(
                        "[MachControlClient] 命名空间 {} 上没有注册监听器，帧已丢弃 ({} 字节)。",
                        frame.namespace,
                        frame.payload.len()
                    );
                    return;
                }
            }
        };
        for listener in listeners {
            listener(frame.namespace, &frame.payload);
        }
    }
}
