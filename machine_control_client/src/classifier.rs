// machine_control_client/src/classifier.rs

//! 入站消息分类模块。
//!
//! 把配方管理命名空间上解析出的 JSON 值归类为类型化的 [`InboundMessage`]。
//! 分类分两步：
//!
//! 1. **显式判别字段**: 消息带 `type` 字段时按其精确匹配已知判别集合
//!    （见 `common_models::ws_payloads` 的 `*_MESSAGE_TYPE` 常量），
//!    未知判别值记录日志后丢弃；
//! 2. **结构启发式兜底**: 旧固件可能省略判别字段，此时按固定优先级
//!    顺序做形状检查。多个 DTO 的形状存在重叠，检查必须按此顺序短路，
//!    否则会误分类（例如认证响应同时满足指令响应的形状）。顺序为：
//!    认证响应 → 指令响应 → 实时视图 → 完整配方 → 步骤目录 →
//!    配方目录 → 执行历史 → 时序数据。首个命中即返回；全部未命中
//!    记录日志后丢弃。
//!
//! 启发式是尽力而为的兜底：如出现新的形状冲突，应推动上游补充显式
//! 判别字段，而不是继续追加规则。

use common_models::execution_models::LiveViewState;
use common_models::recipe_models::Recipe;
use common_models::ws_payloads::{
    AuthResponsePayload, AvailableRecipesPayload, AvailableStepsPayload, CommandResponsePayload,
    ExecutionHistoryPayload, TimeSeriesBinaryPayload, TimeSeriesJsonPayload,
    AUTH_RESPONSE_MESSAGE_TYPE, AVAILABLE_RECIPES_MESSAGE_TYPE, AVAILABLE_STEPS_MESSAGE_TYPE,
    COMMAND_RESPONSE_MESSAGE_TYPE, EXECUTION_HISTORY_MESSAGE_TYPE, LIVEVIEW_MESSAGE_TYPE,
    RECIPE_MESSAGE_TYPE, TIMESERIES_BINARY_MESSAGE_TYPE, TIMESERIES_MESSAGE_TYPE,
};
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 分类完成的入站消息（带类型标签的联合体）。
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// 实时执行视图更新。
    LiveView(LiveViewState),
    /// 可用配方列表。
    AvailableRecipes(AvailableRecipesPayload),
    /// 可用步骤类型目录。
    AvailableSteps(AvailableStepsPayload),
    /// 完整配方（含步骤）。
    Recipe(Recipe),
    /// 历史执行记录列表。
    ExecutionHistory(ExecutionHistoryPayload),
    /// 二进制编码的时序数据。
    TimeSeriesBinary(TimeSeriesBinaryPayload),
    /// JSON 编码的时序数据。
    TimeSeries(TimeSeriesJsonPayload),
    /// 认证响应。
    AuthResponse(AuthResponsePayload),
    /// 指令执行结果响应。
    CommandResponse(CommandResponsePayload),
}

/// 对一个已解析的 JSON 值做分类。
///
/// 返回 `None` 表示消息被丢弃（未知判别值、形状无法识别或反序列化
/// 失败），丢弃原因已记入日志；调用方无需额外处理。
pub fn classify(value: &Value) -> Option<InboundMessage> {
    if let Some(message_type) = value.get("type").and_then(Value::as_str) {
        return classify_by_discriminator(message_type, value);
    }
    classify_by_shape(value)
}

/// 把 JSON 值反序列化为目标负载类型，失败时记录日志并返回 `None`。
fn parse<T: DeserializeOwned>(value: &Value, description: &str) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("[MachControlClient] 反序列化 {} 消息失败，已丢弃: {}", description, e);
            None
        }
    }
}

/// 第一步：按显式判别字段精确匹配。
fn classify_by_discriminator(message_type: &str, value: &Value) -> Option<InboundMessage> {
    match message_type {
        LIVEVIEW_MESSAGE_TYPE => {
            parse::<LiveViewState>(value, "实时视图").map(InboundMessage::LiveView)
        }
        AVAILABLE_RECIPES_MESSAGE_TYPE => {
            parse::<AvailableRecipesPayload>(value, "配方目录").map(InboundMessage::AvailableRecipes)
        }
        AVAILABLE_STEPS_MESSAGE_TYPE => {
            parse::<AvailableStepsPayload>(value, "步骤目录").map(InboundMessage::AvailableSteps)
        }
        RECIPE_MESSAGE_TYPE => parse::<Recipe>(value, "配方").map(InboundMessage::Recipe),
        EXECUTION_HISTORY_MESSAGE_TYPE => {
            parse::<ExecutionHistoryPayload>(value, "执行历史").map(InboundMessage::ExecutionHistory)
        }
        TIMESERIES_BINARY_MESSAGE_TYPE => {
            parse::<TimeSeriesBinaryPayload>(value, "二进制时序数据")
                .map(InboundMessage::TimeSeriesBinary)
        }
        TIMESERIES_MESSAGE_TYPE => {
            parse::<TimeSeriesJsonPayload>(value, "时序数据").map(InboundMessage::TimeSeries)
        }
        AUTH_RESPONSE_MESSAGE_TYPE => {
            parse::<AuthResponsePayload>(value, "认证响应").map(InboundMessage::AuthResponse)
        }
        COMMAND_RESPONSE_MESSAGE_TYPE => {
            parse::<CommandResponsePayload>(value, "指令响应").map(InboundMessage::CommandResponse)
        }
        unknown => {
            warn!("[MachControlClient] 未知的消息判别值 '{}'，消息已丢弃。", unknown);
            None
        }
    }
}

/// 第二步：按固定优先级顺序做结构启发式检查（见模块级文档）。
fn classify_by_shape(value: &Value) -> Option<InboundMessage> {
    // (1) 认证响应：success + role + sessionToken
    if value.get("success").is_some()
        && value.get("role").is_some()
        && value.get("sessionToken").is_some()
    {
        return parse::<AuthResponsePayload>(value, "认证响应(形状)").map(InboundMessage::AuthResponse);
    }
    // (2) 指令响应：success + errorCode，且没有 role
    if value.get("success").is_some()
        && value.get("errorCode").is_some()
        && value.get("role").is_none()
    {
        return parse::<CommandResponsePayload>(value, "指令响应(形状)")
            .map(InboundMessage::CommandResponse);
    }
    // (3) 实时视图：recipeStatus + currentStepIndex
    if value.get("recipeStatus").is_some() && value.get("currentStepIndex").is_some() {
        return parse::<LiveViewState>(value, "实时视图(形状)").map(InboundMessage::LiveView);
    }
    // (4) 完整配方：id + name + steps[]
    if value.get("id").is_some()
        && value.get("name").is_some()
        && value.get("steps").map_or(false, Value::is_array)
    {
        return parse::<Recipe>(value, "配方(形状)").map(InboundMessage::Recipe);
    }
    // (5) 步骤目录：steps[] 的首个元素带 typeId，且顶层没有 id
    if let Some(steps) = value.get("steps").and_then(Value::as_array) {
        if value.get("id").is_none() && steps.first().map_or(false, |step| step.get("typeId").is_some())
        {
            return parse::<AvailableStepsPayload>(value, "步骤目录(形状)")
                .map(InboundMessage::AvailableSteps);
        }
    }
    // (6) 配方目录：recipes[]
    if value.get("recipes").map_or(false, Value::is_array) {
        return parse::<AvailableRecipesPayload>(value, "配方目录(形状)")
            .map(InboundMessage::AvailableRecipes);
    }
    // (7) 执行历史：executions[]
    if value.get("executions").map_or(false, Value::is_array) {
        return parse::<ExecutionHistoryPayload>(value, "执行历史(形状)")
            .map(InboundMessage::ExecutionHistory);
    }
    // (8) 时序数据：executionId + series[]，或 executionId + binaryData + startTime
    if value.get("executionId").is_some() {
        if value.get("series").map_or(false, Value::is_array) {
            return parse::<TimeSeriesJsonPayload>(value, "时序数据(形状)")
                .map(InboundMessage::TimeSeries);
        }
        if value.get("binaryData").is_some() && value.get("startTime").is_some() {
            return parse::<TimeSeriesBinaryPayload>(value, "二进制时序数据(形状)")
                .map(InboundMessage::TimeSeriesBinary);
        }
    }

    warn!(
        "[MachControlClient] 无法按结构识别的入站消息，已丢弃。顶层字段: {:?}",
        value
            .as_object()
            .map(|object| object.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default()
    );
    None
}
