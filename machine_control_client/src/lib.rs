// machine_control_client/src/lib.rs

//! `machine_control_client` 机控客户端核心 crate。
//!
//! 这是浏览器托管界面与嵌入式控制器之间持久消息通道的客户端核心：
//! 在单条 WebSocket 连接上以 32 位命名空间复用多个逻辑通道，把入站
//! 消息分类为类型化的领域事件，并维护唯一的权威状态快照，向多个 UI
//! 视图保证一致、有序的状态传播。界面渲染、路由与弹窗等均不在本 crate
//! 范围内，外层通过 [`event::UiNotifier`] 与状态订阅与核心交互。
//!
//! 分层（自下而上）：
//! - [`transport`]: 连接服务——连接生命周期、出站缓冲、锁定请求、心跳；
//! - [`dispatcher`]: 指令发送（附加会话令牌）与入站帧按命名空间路由；
//! - [`classifier`]: 显式判别字段 + 结构启发式的入站消息分类；
//! - [`handler`]: 配方命名空间监听器，把分类结果应用到状态存储；
//! - [`state`]: 订阅式集中状态存储（"通知即轮询"）；
//! - [`storage`] / [`config`] / [`event`]: 本地持久化、配置与 UI 通知面。
//!
//! 所有组件都通过 [`ClientContext`] 显式构造并以引用注入的方式接线，
//! 没有进程级全局量；生命周期由 `init`/`shutdown` 显式控制。

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod state;
pub mod storage;
pub mod transport;

pub use config::AppConfig;
pub use error::ClientError;
pub use event::{LogNotifier, UiNotifier};
pub use state::StateStore;

use crate::dispatcher::{Dispatcher, ListenerRegistration};
use crate::handler::RecipeChannelHandler;
use crate::storage::JsonFileStore;
use crate::transport::ConnectionService;
use anyhow::{Context, Result};
use common_models::ws_payloads::RECIPE_NAMESPACE;
use log::info;
use std::sync::{Arc, Mutex};
use url::Url;

/// 客户端核心的依赖注入上下文。
///
/// 持有全部核心组件的唯一实例并负责它们之间的接线：
/// 配置 → 本地存储 → 状态存储 → 连接服务 → 指令分发器 → 配方通道处理器。
/// 组件都是进程生命周期的单例，但由上下文显式构造并传递，
/// 不存在模块加载时的隐式初始化。
pub struct ClientContext {
    config: AppConfig,
    /// 集中状态存储，UI 层在此订阅状态变化。
    pub state: Arc<StateStore>,
    /// 连接服务，UI 层可读取链路状态。
    pub transport: Arc<ConnectionService>,
    /// 指令分发器，UI 层经由它下发领域指令。
    pub dispatcher: Arc<Dispatcher>,
    handler: Arc<RecipeChannelHandler>,
    recipe_listener: Mutex<Option<ListenerRegistration>>,
}

impl ClientContext {
    /// 按给定配置与通知器构造全部核心组件。
    ///
    /// 构造只做接线与本地恢复（状态存储会从本地存储恢复会话与目录
    /// 缓存），不建立网络连接；连接建立发生在 [`ClientContext::init`]
    /// 或显式的 [`ClientContext::connect`] 调用中。
    pub fn new(config: AppConfig, notifier: Arc<dyn UiNotifier>) -> Self {
        let storage = Arc::new(JsonFileStore::new(config.storage_dir.clone()));
        let state = Arc::new(StateStore::new(storage));
        let transport = Arc::new(ConnectionService::new(Arc::clone(&notifier)));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&transport),
            Arc::clone(&state),
            config.default_lock_timeout_ms,
        ));
        let handler = Arc::new(RecipeChannelHandler::new(
            Arc::clone(&state),
            Arc::clone(&dispatcher),
            notifier,
        ));
        Self {
            config,
            state,
            transport,
            dispatcher,
            handler,
            recipe_listener: Mutex::new(None),
        }
    }

    /// 初始化核心：注册配方命名空间监听器；配置允许时自动连接控制器。
    pub async fn init(&self) -> Result<()> {
        info!("[MachControlClient] 客户端核心初始化...");
        let handler = Arc::clone(&self.handler);
        let registration = self.dispatcher.register_listener(
            Arc::new(move |_namespace, payload| handler.handle_payload(payload)),
            &[RECIPE_NAMESPACE],
        );
        *self.recipe_listener.lock().unwrap() = Some(registration);

        if self.config.auto_connect {
            self.connect().await?;
        }
        Ok(())
    }

    /// 连接（或重连）到配置的控制器端点。
    ///
    /// 只做 URL 校验与连接任务安排；实际的连接成败通过通知器异步上报。
    pub async fn connect(&self) -> Result<()> {
        let url = Url::parse(&self.config.controller_ws_url).with_context(|| {
            format!(
                "配置的控制器地址 '{}' 不是合法的 URL",
                self.config.controller_ws_url
            )
        })?;
        let dispatcher = Arc::clone(&self.dispatcher);
        Arc::clone(&self.transport)
            .connect(
                url.to_string(),
                Arc::new(move |frame| dispatcher.on_frame_received(&frame)),
            )
            .await;
        Ok(())
    }

    /// 关闭核心：断开连接并退订配方命名空间监听器。
    pub async fn shutdown(&self) {
        self.transport.disconnect().await;
        let registration = self.recipe_listener.lock().unwrap().take();
        if let Some(registration) = registration {
            self.dispatcher.unregister_listener(registration);
        }
        info!("[MachControlClient] 客户端核心已关闭。");
    }

    /// 当前生效的应用配置。
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
