// machine_control_client/src/handler.rs

//! 配方管理命名空间的入站消息处理器。
//!
//! `RecipeChannelHandler` 是注册在配方管理命名空间上的监听器，按固定
//! 流水线处理每个入站负载：JSON 解析（失败即丢弃并记录）→ 分类
//! （见 [`crate::classifier`]）→ 应用到状态存储。除状态更新外还承担
//! 两类副作用：
//!
//! - **急切一致性拉取**: 实时视图中的配方标识与本地已加载配方不一致时，
//!   主动发出 `get_recipe` 拉取完整配方（发后不理）；
//! - **认证失败处理**: 指令响应携带 401 时清除本地会话并提示重新登录，
//!   403 仅上报用户可见错误，会话保留。

use crate::classifier::{classify, InboundMessage};
use crate::dispatcher::Dispatcher;
use crate::event::{UiNotifier, UserErrorEvent};
use crate::state::StateStore;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use common_models::execution_models::LiveViewState;
use common_models::timeseries_models::TimeSeriesData;
use common_models::ws_payloads::{
    AuthResponsePayload, ClientCommand, CommandResponsePayload, TimeSeriesBinaryPayload,
};
use common_models::Session;
use log::{debug, info, warn};
use machine_ws_utils::timeseries::decode_time_series;
use std::sync::Arc;

/// 配方命名空间消息处理器。见模块级文档。
pub struct RecipeChannelHandler {
    state: Arc<StateStore>,
    dispatcher: Arc<Dispatcher>,
    notifier: Arc<dyn UiNotifier>,
}

impl RecipeChannelHandler {
    /// 创建处理器。
    pub fn new(
        state: Arc<StateStore>,
        dispatcher: Arc<Dispatcher>,
        notifier: Arc<dyn UiNotifier>,
    ) -> Self {
        Self {
            state,
            dispatcher,
            notifier,
        }
    }

    /// 处理配方命名空间上的一个入站负载。监听器回调入口。
    pub fn handle_payload(&self, payload: &[u8]) {
        let value: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "[MachControlClient] 配方命名空间负载不是合法 JSON，已丢弃 ({} 字节): {}",
                    payload.len(),
                    e
                );
                return;
            }
        };
        // 丢弃原因（未知判别值、形状无法识别、反序列化失败）由分类器记录
        let Some(message) = classify(&value) else {
            return;
        };
        self.apply(message);
    }

    /// 把分类完成的消息应用到状态存储。
    fn apply(&self, message: InboundMessage) {
        match message {
            InboundMessage::LiveView(live_view) => self.apply_live_view(live_view),
            InboundMessage::AvailableRecipes(payload) => {
                debug!(
                    "[MachControlClient] 收到配方目录，共 {} 条。",
                    payload.recipes.len()
                );
                self.state.set_available_recipes(payload.recipes);
            }
            InboundMessage::AvailableSteps(payload) => {
                debug!(
                    "[MachControlClient] 收到步骤类型目录，共 {} 条。",
                    payload.steps.len()
                );
                self.state.set_available_steps(payload.steps);
            }
            InboundMessage::Recipe(recipe) => {
                info!("[MachControlClient] 收到完整配方 '{}' ({})。", recipe.name, recipe.id);
                self.state.set_current_recipe(recipe);
            }
            InboundMessage::ExecutionHistory(payload) => {
                debug!(
                    "[MachControlClient] 收到执行历史，共 {} 条。",
                    payload.executions.len()
                );
                self.state.set_execution_history(payload.executions);
            }
            InboundMessage::TimeSeries(payload) => {
                self.state.set_time_series_data(TimeSeriesData {
                    execution_id: payload.execution_id,
                    series: payload.series,
                });
            }
            InboundMessage::TimeSeriesBinary(payload) => self.apply_binary_time_series(payload),
            InboundMessage::AuthResponse(payload) => self.apply_auth_response(payload),
            InboundMessage::CommandResponse(payload) => self.apply_command_response(payload),
        }
    }

    /// 应用实时视图，并在配方不一致时发出急切拉取。
    fn apply_live_view(&self, live_view: LiveViewState) {
        let loaded_recipe_id = self.state.current_recipe().map(|recipe| recipe.id);
        let recipe_to_fetch = match &live_view.recipe_id {
            Some(recipe_id) if loaded_recipe_id.as_deref() != Some(recipe_id.as_str()) => {
                Some(recipe_id.clone())
            }
            _ => None,
        };

        self.state.set_live_view(live_view);

        if let Some(recipe_id) = recipe_to_fetch {
            info!(
                "[MachControlClient] 实时视图中的配方 '{}' 与本地加载的配方不一致，主动拉取完整配方。",
                recipe_id
            );
            if let Err(e) = self
                .dispatcher
                .send_command(ClientCommand::GetRecipe { recipe_id }, Some(0))
            {
                warn!("[MachControlClient] 主动拉取配方失败: {}", e);
            }
        }
    }

    /// 解码二进制时序数据并写入状态存储。
    ///
    /// base64 或二进制格式错误时按数据不可用处理：记录警告、不更新状态。
    fn apply_binary_time_series(&self, payload: TimeSeriesBinaryPayload) {
        let bytes = match BASE64_STANDARD.decode(payload.binary_data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "[MachControlClient] 时序数据的 binaryData 不是合法的 base64，已丢弃 (执行 {}): {}",
                    payload.execution_id, e
                );
                return;
            }
        };
        match decode_time_series(&payload.execution_id, payload.start_time, &bytes) {
            Ok(data) => {
                debug!(
                    "[MachControlClient] 二进制时序数据解码完成 (执行 {}，{} 条序列)。",
                    data.execution_id,
                    data.series.len()
                );
                self.state.set_time_series_data(data);
            }
            Err(e) => {
                warn!(
                    "[MachControlClient] 二进制时序数据解码失败，数据按不可用处理 (执行 {}): {}",
                    payload.execution_id, e
                );
            }
        }
    }

    /// 应用认证响应：成功时建立并持久化会话，失败时上报用户可见错误。
    fn apply_auth_response(&self, payload: AuthResponsePayload) {
        if payload.success {
            match (payload.role, payload.session_token) {
                (Some(role), Some(token)) => {
                    info!("[MachControlClient] 登录成功，角色: {}", role);
                    self.state.set_session(Session { token, role });
                }
                _ => warn!(
                    "[MachControlClient] 认证成功响应缺少 role 或 sessionToken 字段，已忽略。"
                ),
            }
        } else {
            let message = payload.message.unwrap_or_else(|| "登录失败".to_string());
            warn!("[MachControlClient] 认证失败: {}", message);
            self.notifier.user_error(UserErrorEvent { message });
        }
    }

    /// 应用指令响应：401 清除会话并提示重新登录，403 保留会话仅上报错误，
    /// 其他失败按通用用户可见错误上报。
    fn apply_command_response(&self, payload: CommandResponsePayload) {
        if payload.success {
            debug!(
                "[MachControlClient] 指令执行成功 (requestId: {:?})。",
                payload.request_id
            );
            return;
        }
        match payload.error_code {
            Some(401) => {
                // 会话失效：清除本地会话，交由外层提示重新登录
                warn!("[MachControlClient] 指令被拒绝 (401)，会话已失效。");
                self.state.clear_session();
                self.notifier.auth_required();
            }
            Some(403) => {
                let message = payload
                    .message
                    .unwrap_or_else(|| "当前角色没有执行该操作的权限。".to_string());
                warn!("[MachControlClient] 指令被拒绝 (403): {}", message);
                self.notifier.user_error(UserErrorEvent { message });
            }
            other => {
                let message = payload.message.unwrap_or_else(|| match other {
                    Some(code) => format!("指令执行失败 (错误码 {})。", code),
                    None => "指令执行失败。".to_string(),
                });
                warn!("[MachControlClient] 指令执行失败: {}", message);
                self.notifier.user_error(UserErrorEvent { message });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ConnectionStatusEvent;
    use crate::storage::JsonFileStore;
    use crate::transport::{ConnectionService, Outbound};
    use common_models::enums::OperatorRole;
    use common_models::recipe_models::Recipe;
    use common_models::timeseries_models::{DataPoint, SensorSeries};
    use common_models::ws_payloads::RECIPE_NAMESPACE;
    use machine_ws_utils::timeseries::encode_time_series;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// 记录用户可见错误与重新登录提示的测试通知器。
    #[derive(Default)]
    struct RecordingNotifier {
        user_errors: Mutex<Vec<String>>,
        auth_required_count: Mutex<usize>,
    }

    impl UiNotifier for RecordingNotifier {
        fn connection_status_changed(&self, _event: ConnectionStatusEvent) {}
        fn busy_changed(&self, _busy: bool) {}
        fn user_error(&self, event: UserErrorEvent) {
            self.user_errors.lock().unwrap().push(event.message);
        }
        fn auth_required(&self) {
            *self.auth_required_count.lock().unwrap() += 1;
        }
    }

    struct Harness {
        transport: Arc<ConnectionService>,
        state: Arc<StateStore>,
        notifier: Arc<RecordingNotifier>,
        handler: RecipeChannelHandler,
        dir: std::path::PathBuf,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    /// 辅助函数：构造挂在临时存储目录上的完整处理器栈。
    fn build_harness() -> Harness {
        let dir = std::env::temp_dir().join(format!("machine_control_handler_test_{}", Uuid::new_v4()));
        let notifier = Arc::new(RecordingNotifier::default());
        let transport = Arc::new(ConnectionService::new(notifier.clone()));
        let state = Arc::new(StateStore::new(Arc::new(JsonFileStore::new(dir.clone()))));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&transport), Arc::clone(&state), 5000));
        let handler = RecipeChannelHandler::new(Arc::clone(&state), dispatcher, notifier.clone());
        Harness {
            transport,
            state,
            notifier,
            handler,
            dir,
        }
    }

    fn sample_recipe(id: &str) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: "清洗流程".to_string(),
            steps: Vec::new(),
            global_parameters: Vec::new(),
        }
    }

    #[tokio::test]
    /// 测试实时视图应用与急切拉取：配方标识与本地加载的不一致时，
    /// 应随状态更新发出一条 get_recipe 指令。
    async fn test_live_view_mismatch_triggers_recipe_fetch() {
        let harness = build_harness();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        harness.transport.on_link_opened(tx);

        harness.handler.handle_payload(
            br#"{"type":"liveview","recipeId":"recipe-9","recipeStatus":"running","currentStepIndex":0}"#,
        );

        assert!(harness.state.live_view().is_some(), "实时视图应已写入状态存储");
        match rx.try_recv().expect("应发出急切拉取指令") {
            Outbound::Frame(frame) => {
                assert_eq!(frame.namespace, RECIPE_NAMESPACE, "拉取指令应走配方管理命名空间");
                let value: serde_json::Value =
                    serde_json::from_slice(&frame.payload).expect("指令负载应为合法 JSON");
                assert_eq!(value["command"], "get_recipe", "应发出 get_recipe 指令");
                assert_eq!(value["recipeId"], "recipe-9", "拉取的配方标识不正确");
            }
            other => panic!("期望写出业务帧，实际为 {:?}", other),
        }
    }

    #[tokio::test]
    /// 测试实时视图的配方与本地一致时不触发拉取。
    async fn test_live_view_match_does_not_fetch() {
        let harness = build_harness();
        harness.state.set_current_recipe(sample_recipe("recipe-9"));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        harness.transport.on_link_opened(tx);

        harness.handler.handle_payload(
            br#"{"type":"liveview","recipeId":"recipe-9","recipeStatus":"running","currentStepIndex":1}"#,
        );

        assert!(harness.state.live_view().is_some(), "实时视图应已写入状态存储");
        assert!(rx.try_recv().is_err(), "配方一致时不应发出拉取指令");
    }

    #[test]
    /// 测试认证响应：成功建立会话，失败上报用户可见错误且不建立会话。
    fn test_auth_response_success_and_failure() {
        let harness = build_harness();

        harness.handler.handle_payload(
            br#"{"type":"auth_response","success":true,"role":"recipe_editor","sessionToken":"tok-9"}"#,
        );
        let session = harness.state.session().expect("登录成功后应建立会话");
        assert_eq!(session.token, "tok-9", "会话令牌不正确");
        assert_eq!(session.role, OperatorRole::RecipeEditor, "会话角色不正确");

        harness.state.clear_session();
        harness.handler.handle_payload(
            br#"{"type":"auth_response","success":false,"message":"PIN 码错误"}"#,
        );
        assert!(harness.state.session().is_none(), "登录失败不应建立会话");
        assert_eq!(
            *harness.notifier.user_errors.lock().unwrap(),
            vec!["PIN 码错误".to_string()],
            "登录失败应上报携带原因的用户可见错误"
        );
    }

    #[test]
    /// 测试 401 指令响应：清除会话并提示重新登录。
    fn test_command_response_401_clears_session() {
        let harness = build_harness();
        harness.state.set_session(Session {
            token: "tok-expired".to_string(),
            role: OperatorRole::Admin,
        });

        harness.handler.handle_payload(
            br#"{"type":"command_response","success":false,"errorCode":401}"#,
        );

        assert!(harness.state.session().is_none(), "401 应清除本地会话");
        assert_eq!(
            *harness.notifier.auth_required_count.lock().unwrap(),
            1,
            "401 应恰好提示一次重新登录"
        );
    }

    #[test]
    /// 测试 403 指令响应：会话保留，仅上报用户可见错误。
    fn test_command_response_403_keeps_session() {
        let harness = build_harness();
        harness.state.set_session(Session {
            token: "tok-observer".to_string(),
            role: OperatorRole::Observer,
        });

        harness.handler.handle_payload(
            br#"{"type":"command_response","success":false,"errorCode":403,"message":"观察者不能启动配方"}"#,
        );

        assert!(harness.state.session().is_some(), "403 不应清除会话");
        assert_eq!(
            *harness.notifier.user_errors.lock().unwrap(),
            vec!["观察者不能启动配方".to_string()],
            "403 应上报携带原因的用户可见错误"
        );
        assert_eq!(
            *harness.notifier.auth_required_count.lock().unwrap(),
            0,
            "403 不应提示重新登录"
        );
    }

    #[test]
    /// 测试二进制时序数据：合法数据解码后写入状态，魔数错误时状态保持不变。
    fn test_binary_time_series_decode_and_reject() {
        let harness = build_harness();
        let start_time: i64 = 1_718_000_000_000;
        let series = vec![SensorSeries {
            sensor_name: "温度".to_string(),
            unit: "℃".to_string(),
            data_points: vec![DataPoint {
                timestamp: start_time + 500,
                value: 23.5,
            }],
        }];
        let encoded = encode_time_series(start_time, &series);
        let payload = serde_json::json!({
            "type": "timeseries_binary",
            "executionId": "exec-1",
            "binaryData": BASE64_STANDARD.encode(&encoded),
            "startTime": start_time
        });
        harness.handler.handle_payload(payload.to_string().as_bytes());

        let data = harness.state.time_series_data().expect("合法二进制时序数据应写入状态");
        assert_eq!(data.execution_id, "exec-1", "executionId 不正确");
        assert_eq!(data.series, series, "解码出的序列与原始序列不相等");

        // 魔数错误：数据按不可用处理，状态保持上一次的值
        let mut corrupted = encoded.clone();
        corrupted[0] ^= 0xFF;
        let payload = serde_json::json!({
            "type": "timeseries_binary",
            "executionId": "exec-2",
            "binaryData": BASE64_STANDARD.encode(&corrupted),
            "startTime": start_time
        });
        harness.handler.handle_payload(payload.to_string().as_bytes());

        let data = harness.state.time_series_data().expect("状态应保持上一次的有效数据");
        assert_eq!(data.execution_id, "exec-1", "格式错误的数据不应覆盖状态");
    }

    #[test]
    /// 测试非法 JSON 负载：丢弃且不 panic，状态不变。
    fn test_malformed_json_payload_is_dropped() {
        let harness = build_harness();
        harness.handler.handle_payload(b"\x00\x01 not json");
        harness.handler.handle_payload(b"{ truncated");
        assert!(harness.state.live_view().is_none(), "非法负载不应产生任何状态变化");
    }

    #[test]
    /// 测试启发式路径的端到端：无判别字段的配方目录消息照常应用到状态。
    fn test_shape_classified_message_is_applied() {
        let harness = build_harness();
        harness.handler.handle_payload(
            br#"{"recipes":[{"id":"recipe-1","name":"清洗流程"}]}"#,
        );
        let recipes = harness.state.available_recipes().expect("配方目录应写入状态");
        assert_eq!(recipes.len(), 1, "配方目录条数不正确");
        assert_eq!(recipes[0].id, "recipe-1", "配方标识不正确");
    }
}
