// common_models/src/ws_payloads.rs

//! WebSocket 通信中使用的消息类型常量、入站负载结构体与出站指令定义。
//!
//! 配方管理子系统约定占用一个保留命名空间 (`RECIPE_NAMESPACE`)，
//! 该命名空间上的负载为 JSON。入站消息通过 `type` 判别字段标识类型
//! （见下方 `*_MESSAGE_TYPE` 常量）；旧固件可能省略判别字段，
//! 此时由客户端核心的结构启发式分类器兜底。
//!
//! 出站指令统一为 `ClientCommand` 枚举（serde 内部标签 `command`），
//! 发送前由 `CommandEnvelope` 附加请求标识与会话令牌。

use crate::enums::OperatorRole;
use crate::execution_models::ExecutionRecord;
use crate::recipe_models::{Recipe, RecipeSummary, StepTypeDescriptor};
use crate::timeseries_models::SensorSeries;
use serde::{Deserialize, Serialize};

/// 配方管理子系统保留的逻辑命名空间。
///
/// 单条物理连接上以 32 位无符号整数命名空间复用多个逻辑通道，
/// 此值为约定分配，整个配方管理子系统（指令与事件）都走该通道。
pub const RECIPE_NAMESPACE: u32 = 5;

// --- 入站消息判别常量 ---
// 控制器在消息 JSON 的 `type` 字段携带以下字符串之一。

/// 实时执行视图更新。
pub const LIVEVIEW_MESSAGE_TYPE: &str = "liveview";
/// 可用配方列表。
pub const AVAILABLE_RECIPES_MESSAGE_TYPE: &str = "available_recipes";
/// 可用步骤类型目录。
pub const AVAILABLE_STEPS_MESSAGE_TYPE: &str = "available_steps";
/// 完整配方（含步骤）。
pub const RECIPE_MESSAGE_TYPE: &str = "recipe";
/// 历史执行记录列表。
pub const EXECUTION_HISTORY_MESSAGE_TYPE: &str = "execution_history";
/// 二进制编码的时序数据（`binaryData` 为 base64）。
pub const TIMESERIES_BINARY_MESSAGE_TYPE: &str = "timeseries_binary";
/// JSON 编码的时序数据。
pub const TIMESERIES_MESSAGE_TYPE: &str = "timeseries";
/// 认证响应。
pub const AUTH_RESPONSE_MESSAGE_TYPE: &str = "auth_response";
/// 指令执行结果响应。
pub const COMMAND_RESPONSE_MESSAGE_TYPE: &str = "command_response";

// --- 入站负载结构体 ---

/// 认证响应负载。
///
/// 认证成功时 `role` 与 `session_token` 必定存在；失败时两者缺失，
/// `message` 可能携带失败原因。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponsePayload {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<OperatorRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 指令执行结果响应负载。
///
/// `error_code` 采用 HTTP 风格语义：401 表示会话无效（需重新登录），
/// 403 表示角色权限不足（会话仍然有效）。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponsePayload {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 对应出站指令的 `request_id`，可选。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// 可用配方列表负载。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableRecipesPayload {
    pub recipes: Vec<RecipeSummary>,
}

/// 可用步骤类型目录负载。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableStepsPayload {
    pub steps: Vec<StepTypeDescriptor>,
}

/// 历史执行记录负载。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHistoryPayload {
    pub executions: Vec<ExecutionRecord>,
}

/// JSON 编码时序数据负载（`timeseries` 消息）。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesJsonPayload {
    pub execution_id: String,
    pub series: Vec<SensorSeries>,
}

/// 二进制编码时序数据负载（`timeseries_binary` 消息）。
///
/// `binary_data` 为二进制时序格式的 base64 编码；`start_time` 为本次执行的
/// 启动时间戳 (Unix epoch 毫秒)，解码时用于将相对时间戳换算为绝对时间戳。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesBinaryPayload {
    pub execution_id: String,
    pub binary_data: String,
    pub start_time: i64,
}

// --- 出站指令 ---

/// 客户端可向控制器下发的指令集合。
///
/// serde 内部标签 `command` 使线上形式为
/// `{"command": "start_recipe", "recipeId": "..."}`——指令名为 snake_case，
/// 字段名为 camelCase。相对于自由字符串指令名，枚举让未知指令在编译期即被发现。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// 以 PIN 码登录，期待 `auth_response` 回复。
    Login { pin: String },
    /// 注销当前会话。
    Logout,
    /// 启动指定配方的执行。
    StartRecipe { recipe_id: String },
    /// 停止当前执行。
    StopRecipe,
    /// 暂停当前执行。
    PauseRecipe,
    /// 恢复已暂停的执行。
    ResumeRecipe,
    /// 确认当前等待确认的步骤。
    AcknowledgeStep { step_index: u32 },
    /// 保存（新建或覆盖）配方。
    SaveRecipe { payload: Recipe },
    /// 删除配方。
    DeleteRecipe { recipe_id: String },
    /// 删除历史执行记录及其时序数据。
    DeleteExecution { execution_id: String },
    /// 修改登录 PIN 码。
    ChangePin { old_pin: String, new_pin: String },
    /// 拉取完整配方。
    GetRecipe { recipe_id: String },
    /// 拉取可用配方列表。
    GetAvailableRecipes,
    /// 拉取可用步骤类型目录。
    GetAvailableSteps,
    /// 拉取历史执行记录。
    GetExecutionHistory,
    /// 拉取指定执行的时序数据。
    GetTimeSeries { execution_id: String },
}

impl ClientCommand {
    /// 返回该指令是否必须携带会话令牌。
    ///
    /// 对这些指令，发送方必须在信封中填入当前会话令牌；令牌缺失时
    /// 仍然发送（由控制器拒绝），但应记录一条警告日志。
    /// 只读指令不在此列，令牌按"有则附带"的方式处理，不产生警告。
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            ClientCommand::StartRecipe { .. }
                | ClientCommand::StopRecipe
                | ClientCommand::PauseRecipe
                | ClientCommand::ResumeRecipe
                | ClientCommand::AcknowledgeStep { .. }
                | ClientCommand::SaveRecipe { .. }
                | ClientCommand::DeleteRecipe { .. }
                | ClientCommand::DeleteExecution { .. }
                | ClientCommand::ChangePin { .. }
        )
    }

    /// 返回指令的线上名称（`command` 字段取值），用于日志输出。
    pub fn wire_name(&self) -> &'static str {
        match self {
            ClientCommand::Login { .. } => "login",
            ClientCommand::Logout => "logout",
            ClientCommand::StartRecipe { .. } => "start_recipe",
            ClientCommand::StopRecipe => "stop_recipe",
            ClientCommand::PauseRecipe => "pause_recipe",
            ClientCommand::ResumeRecipe => "resume_recipe",
            ClientCommand::AcknowledgeStep { .. } => "acknowledge_step",
            ClientCommand::SaveRecipe { .. } => "save_recipe",
            ClientCommand::DeleteRecipe { .. } => "delete_recipe",
            ClientCommand::DeleteExecution { .. } => "delete_execution",
            ClientCommand::ChangePin { .. } => "change_pin",
            ClientCommand::GetRecipe { .. } => "get_recipe",
            ClientCommand::GetAvailableRecipes => "get_available_recipes",
            ClientCommand::GetAvailableSteps => "get_available_steps",
            ClientCommand::GetExecutionHistory => "get_execution_history",
            ClientCommand::GetTimeSeries { .. } => "get_timeseries",
        }
    }
}

/// 出站指令信封：指令本体 + 请求标识 + 会话令牌。
///
/// `request_id` 用于将 `command_response` 与发出的指令关联；
/// `session_token` 的填充规则见 [`ClientCommand::requires_auth`]。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    #[serde(flatten)]
    pub command: ClientCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}
