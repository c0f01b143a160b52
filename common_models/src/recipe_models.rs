// common_models/src/recipe_models.rs

//! 配方相关的共享数据模型。
//!
//! 配方 (`Recipe`) 是一组有序的设备控制步骤，带有命名参数与 I/O 别名映射，
//! 由控制器负责执行。本模块同时定义了配方列表条目 (`RecipeSummary`)
//! 与可用步骤类型目录 (`StepTypeDescriptor`)。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 配方中的单个控制步骤。
///
/// `parameters` 的取值类型由步骤类型决定（数值、字符串、布尔等），
/// 因此以 `serde_json::Value` 承载；`io_aliases` 将步骤内的逻辑 I/O 名
/// 映射到控制器上的物理通道名。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStep {
    /// 步骤在配方内的唯一标识。
    pub id: String,
    /// 步骤类型标识，对应 `StepTypeDescriptor::type_id`。
    pub type_id: String,
    /// 步骤的显示名称。
    pub name: String,
    /// 步骤参数，键为参数名。
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// 逻辑 I/O 名到物理通道名的映射。
    #[serde(default)]
    pub io_aliases: HashMap<String, String>,
}

/// 配方级全局参数。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalParameter {
    /// 参数名。
    pub key: String,
    /// 参数值。
    pub value: serde_json::Value,
    /// 单位，可选（例如 "℃", "ml"）。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// 当前加载的完整配方。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// 配方唯一标识。
    pub id: String,
    /// 配方名称。
    pub name: String,
    /// 有序的步骤列表。
    pub steps: Vec<RecipeStep>,
    /// 配方级全局参数。
    #[serde(default)]
    pub global_parameters: Vec<GlobalParameter>,
}

/// 可用配方列表中的条目（不含步骤详情）。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// 步骤类型的参数描述，用于配方编辑界面生成输入表单。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepParameterDescriptor {
    /// 参数名。
    pub key: String,
    /// 显示标签，可选。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// 数据类型描述字符串（例如 "number", "string", "boolean"），可选。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// 默认值，可选。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

/// 控制器支持的步骤类型目录条目。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepTypeDescriptor {
    /// 步骤类型唯一标识。
    pub type_id: String,
    /// 步骤类型名称。
    pub name: String,
    /// 说明文字，可选。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 该类型步骤可配置的参数列表。
    #[serde(default)]
    pub parameters: Vec<StepParameterDescriptor>,
}
