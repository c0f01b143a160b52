// machine_control_client/src/state.rs

//! 集中式状态存储模块。
//!
//! `StateStore` 持有来自控制器的权威状态的唯一内存快照：实时执行视图、
//! 可用配方/步骤目录、当前加载的配方、历史执行记录、时序数据、
//! 选中的执行以及登录会话。各个设置器整体替换对应字段（替换而非合并），
//! 然后按订阅顺序同步通知所有订阅者；通知不携带负载，订阅者通过
//! 读取器重新拉取自己关心的字段（"通知即轮询"模式）。
//!
//! # 重入约定
//!
//! 通知是完全同步的且不做重入保护：订阅者在自己的通知回调内再调用
//! 任何设置器会递归地重新进入通知流程。**订阅者不得在通知回调中
//! 同步修改状态**；需要联动修改时应将其排入事件循环的下一轮。
//!
//! # 持久化
//!
//! 会话在每次 `set_session`/`clear_session` 时写入/移除本地存储，
//! 并在构造时恢复。配方与步骤目录在每次收到权威数据时写入本地缓存
//! （权威空列表会清空缓存），构造时读入作为控制器不可达时的降级数据源。

use crate::storage::{JsonFileStore, AVAILABLE_RECIPES_ENTRY, AVAILABLE_STEPS_ENTRY, SESSION_ENTRY};
use common_models::execution_models::{ExecutionRecord, LiveViewState};
use common_models::recipe_models::{Recipe, RecipeSummary, StepTypeDescriptor};
use common_models::timeseries_models::TimeSeriesData;
use common_models::Session;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 订阅句柄，用于退订。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(Uuid);

type Subscriber = Arc<dyn Fn() + Send + Sync>;

/// 状态快照：各字段相互独立，均为可选。
#[derive(Default)]
struct Snapshot {
    live_view: Option<LiveViewState>,
    available_recipes: Option<Vec<RecipeSummary>>,
    available_steps: Option<Vec<StepTypeDescriptor>>,
    current_recipe: Option<Recipe>,
    execution_history: Option<Vec<ExecutionRecord>>,
    time_series: Option<TimeSeriesData>,
    selected_execution_id: Option<String>,
    session: Option<Session>,
}

/// 集中式状态存储。见模块级文档。
pub struct StateStore {
    snapshot: Mutex<Snapshot>,
    subscribers: Mutex<Vec<(Uuid, Subscriber)>>,
    storage: Arc<JsonFileStore>,
}

impl StateStore {
    /// 以指定的本地存储创建状态存储。
    ///
    /// 构造时从本地存储恢复会话，并将目录缓存读入快照作为降级数据源
    /// （随后到达的权威数据会整体覆盖它们）。
    pub fn new(storage: Arc<JsonFileStore>) -> Self {
        let mut snapshot = Snapshot::default();

        if let Some(session) = storage.load::<Session>(SESSION_ENTRY) {
            info!("[MachControlClient] 已从本地存储恢复会话 (角色: {})", session.role);
            snapshot.session = Some(session);
        }
        if let Some(recipes) = storage.load::<Vec<RecipeSummary>>(AVAILABLE_RECIPES_ENTRY) {
            debug!("[MachControlClient] 已从本地缓存读入 {} 条配方目录作为降级数据源", recipes.len());
            snapshot.available_recipes = Some(recipes);
        }
        if let Some(steps) = storage.load::<Vec<StepTypeDescriptor>>(AVAILABLE_STEPS_ENTRY) {
            debug!("[MachControlClient] 已从本地缓存读入 {} 条步骤目录作为降级数据源", steps.len());
            snapshot.available_steps = Some(steps);
        }

        Self {
            snapshot: Mutex::new(snapshot),
            subscribers: Mutex::new(Vec::new()),
            storage,
        }
    }

    // --- 订阅管理 ---

    /// 注册一个状态变更订阅者，返回用于退订的句柄。
    ///
    /// 订阅者按注册顺序被同步调用，且不携带负载；回调内通过读取器
    /// 重新读取状态。回调内不得同步调用设置器（见模块级文档）。
    pub fn subscribe(&self, subscriber: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.subscribers.lock().unwrap().push((id, Arc::new(subscriber)));
        SubscriptionId(id)
    }

    /// 按句柄退订。句柄无效时静默忽略。
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|(sub_id, _)| *sub_id != id.0);
    }

    /// 按订阅顺序同步调用所有订阅者。
    ///
    /// 先克隆订阅者列表再逐个调用，保证回调执行期间不持有内部锁，
    /// 订阅者因此可以安全地调用读取器。
    fn notify(&self) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();
        for subscriber in subscribers {
            subscriber();
        }
    }

    // --- 设置器（整体替换 + 通知） ---

    /// 替换实时执行视图。
    pub fn set_live_view(&self, live_view: LiveViewState) {
        self.snapshot.lock().unwrap().live_view = Some(live_view);
        self.notify();
    }

    /// 替换可用配方目录，并写入本地缓存（空列表会清空缓存内容）。
    pub fn set_available_recipes(&self, recipes: Vec<RecipeSummary>) {
        if let Err(e) = self.storage.save(AVAILABLE_RECIPES_ENTRY, &recipes) {
            warn!("[MachControlClient] 写入配方目录缓存失败: {}", e);
        }
        self.snapshot.lock().unwrap().available_recipes = Some(recipes);
        self.notify();
    }

    /// 替换可用步骤类型目录，并写入本地缓存。
    pub fn set_available_steps(&self, steps: Vec<StepTypeDescriptor>) {
        if let Err(e) = self.storage.save(AVAILABLE_STEPS_ENTRY, &steps) {
            warn!("[MachControlClient] 写入步骤目录缓存失败: {}", e);
        }
        self.snapshot.lock().unwrap().available_steps = Some(steps);
        self.notify();
    }

    /// 替换当前加载的配方。
    pub fn set_current_recipe(&self, recipe: Recipe) {
        self.snapshot.lock().unwrap().current_recipe = Some(recipe);
        self.notify();
    }

    /// 替换历史执行记录。
    pub fn set_execution_history(&self, executions: Vec<ExecutionRecord>) {
        self.snapshot.lock().unwrap().execution_history = Some(executions);
        self.notify();
    }

    /// 替换时序数据。
    pub fn set_time_series_data(&self, data: TimeSeriesData) {
        self.snapshot.lock().unwrap().time_series = Some(data);
        self.notify();
    }

    /// 替换选中的执行标识。
    pub fn set_selected_execution_id(&self, execution_id: Option<String>) {
        self.snapshot.lock().unwrap().selected_execution_id = execution_id;
        self.notify();
    }

    /// 设置会话并持久化。
    pub fn set_session(&self, session: Session) {
        if let Err(e) = self.storage.save(SESSION_ENTRY, &session) {
            warn!("[MachControlClient] 持久化会话失败: {}", e);
        }
        self.snapshot.lock().unwrap().session = Some(session);
        self.notify();
    }

    /// 清除会话（注销或会话失效时），并从本地存储移除。
    pub fn clear_session(&self) {
        if let Err(e) = self.storage.remove(SESSION_ENTRY) {
            warn!("[MachControlClient] 从本地存储移除会话失败: {}", e);
        }
        self.snapshot.lock().unwrap().session = None;
        self.notify();
    }

    /// 清空所有领域数据字段（会话除外——会话在数据重置后仍然有效），
    /// 并通知一次。
    pub fn reset(&self) {
        {
            let mut snapshot = self.snapshot.lock().unwrap();
            let session = snapshot.session.take();
            *snapshot = Snapshot::default();
            snapshot.session = session;
        }
        self.notify();
    }

    // --- 读取器（订阅者在通知后重新拉取） ---

    pub fn live_view(&self) -> Option<LiveViewState> {
        self.snapshot.lock().unwrap().live_view.clone()
    }

    pub fn available_recipes(&self) -> Option<Vec<RecipeSummary>> {
        self.snapshot.lock().unwrap().available_recipes.clone()
    }

    pub fn available_steps(&self) -> Option<Vec<StepTypeDescriptor>> {
        self.snapshot.lock().unwrap().available_steps.clone()
    }

    pub fn current_recipe(&self) -> Option<Recipe> {
        self.snapshot.lock().unwrap().current_recipe.clone()
    }

    pub fn execution_history(&self) -> Option<Vec<ExecutionRecord>> {
        self.snapshot.lock().unwrap().execution_history.clone()
    }

    pub fn time_series_data(&self) -> Option<TimeSeriesData> {
        self.snapshot.lock().unwrap().time_series.clone()
    }

    pub fn selected_execution_id(&self) -> Option<String> {
        self.snapshot.lock().unwrap().selected_execution_id.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.snapshot.lock().unwrap().session.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::enums::{OperatorRole, RecipeStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 辅助函数：为每个测试创建独立临时目录上的状态存储。
    fn temp_state_store() -> (StateStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("machine_control_state_test_{}", Uuid::new_v4()));
        let store = StateStore::new(Arc::new(JsonFileStore::new(dir.clone())));
        (store, dir)
    }

    fn sample_live_view() -> LiveViewState {
        LiveViewState {
            recipe_id: Some("recipe-1".to_string()),
            recipe_status: RecipeStatus::Running,
            current_step_index: 0,
            current_step_name: None,
            execution_id: Some("exec-1".to_string()),
            started_at: Some(1_718_000_000_000),
            message: None,
        }
    }

    #[test]
    /// 测试设置器触发通知，且订阅者按订阅顺序被调用。
    fn test_setters_notify_in_subscription_order() {
        let (store, dir) = temp_state_store();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = Arc::clone(&order);
        store.subscribe(move || order_a.lock().unwrap().push("a"));
        let order_b = Arc::clone(&order);
        store.subscribe(move || order_b.lock().unwrap().push("b"));

        store.set_live_view(sample_live_view());

        assert_eq!(*order.lock().unwrap(), vec!["a", "b"], "订阅者应按订阅顺序被调用");
        assert!(store.live_view().is_some(), "设置后应能读取到实时视图");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    /// 测试退订：退订后的订阅者不再收到通知。
    fn test_unsubscribe_stops_notifications() {
        let (store, dir) = temp_state_store();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let id = store.subscribe(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set_live_view(sample_live_view());
        assert_eq!(counter.load(Ordering::SeqCst), 1, "退订前应收到一次通知");

        store.unsubscribe(id);
        store.set_live_view(sample_live_view());
        assert_eq!(counter.load(Ordering::SeqCst), 1, "退订后不应再收到通知");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    /// 测试 `reset`：清空所有领域字段、保留会话、恰好通知一次。
    fn test_reset_clears_domain_fields_but_keeps_session() {
        let (store, dir) = temp_state_store();
        store.set_live_view(sample_live_view());
        store.set_selected_execution_id(Some("exec-1".to_string()));
        store.set_session(Session {
            token: "tok".to_string(),
            role: OperatorRole::Observer,
        });

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        store.subscribe(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.reset();

        assert_eq!(counter.load(Ordering::SeqCst), 1, "reset 应恰好通知一次");
        assert!(store.live_view().is_none(), "reset 后实时视图应被清空");
        assert!(store.selected_execution_id().is_none(), "reset 后选中执行应被清空");
        assert!(store.session().is_some(), "reset 不应清除会话");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    /// 测试会话持久化：设置后在新的状态存储实例中应被恢复；清除后不再恢复。
    fn test_session_persistence_across_instances() {
        let dir = std::env::temp_dir().join(format!("machine_control_state_test_{}", Uuid::new_v4()));
        let storage = Arc::new(JsonFileStore::new(dir.clone()));
        let session = Session {
            token: "tok-persist".to_string(),
            role: OperatorRole::RecipeStarter,
        };

        {
            let store = StateStore::new(Arc::clone(&storage));
            store.set_session(session.clone());
        }
        {
            let store = StateStore::new(Arc::clone(&storage));
            assert_eq!(store.session(), Some(session), "新实例应恢复持久化的会话");
            store.clear_session();
        }
        {
            let store = StateStore::new(Arc::clone(&storage));
            assert!(store.session().is_none(), "清除会话后新实例不应再恢复会话");
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    /// 测试目录缓存降级：权威数据写入缓存并在新实例中作为降级数据源被读入，
    /// 权威空列表会把缓存覆盖为空。
    fn test_catalog_cache_fallback_and_empty_overwrite() {
        let dir = std::env::temp_dir().join(format!("machine_control_state_test_{}", Uuid::new_v4()));
        let storage = Arc::new(JsonFileStore::new(dir.clone()));
        let recipes = vec![RecipeSummary {
            id: "recipe-1".to_string(),
            name: "清洗流程".to_string(),
            description: None,
        }];

        {
            let store = StateStore::new(Arc::clone(&storage));
            store.set_available_recipes(recipes.clone());
        }
        {
            let store = StateStore::new(Arc::clone(&storage));
            assert_eq!(
                store.available_recipes(),
                Some(recipes),
                "新实例应从缓存读入配方目录作为降级数据源"
            );
            // 权威的空列表同样会覆盖缓存
            store.set_available_recipes(Vec::new());
        }
        {
            let store = StateStore::new(Arc::clone(&storage));
            assert_eq!(
                store.available_recipes(),
                Some(Vec::new()),
                "权威空列表应把缓存覆盖为空列表"
            );
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
