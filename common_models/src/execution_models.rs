// common_models/src/execution_models.rs

//! 执行相关的共享数据模型：实时执行视图与历史执行记录。

use crate::enums::RecipeStatus;
use serde::{Deserialize, Serialize};

/// 控制器下发的实时执行视图。
///
/// 这是控制器的权威执行状态快照，客户端整体替换本地副本，不做增量合并。
/// 所有时间戳均为 Unix epoch 毫秒 (UTC)。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveViewState {
    /// 当前加载配方的标识。控制器空闲时可能缺失。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<String>,
    /// 配方执行状态。
    pub recipe_status: RecipeStatus,
    /// 当前执行到的步骤下标（0 起）。
    pub current_step_index: u32,
    /// 当前步骤名称，可选。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_name: Option<String>,
    /// 本次执行的标识，可选（未启动时缺失）。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    /// 本次执行的启动时间戳，可选。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// 控制器附带的提示信息，可选（例如等待确认时的说明）。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 一次配方执行的历史记录。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// 执行唯一标识。
    pub execution_id: String,
    /// 执行的配方标识。
    pub recipe_id: String,
    /// 执行时的配方名称（配方可能随后被修改或删除，故冗余存储）。
    pub recipe_name: String,
    /// 启动时间戳 (Unix epoch 毫秒, UTC)。
    pub start_time: i64,
    /// 结束时间戳，执行尚未结束时缺失。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    /// 执行的最终（或当前）状态。
    pub status: RecipeStatus,
}
