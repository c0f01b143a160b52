//! 通用枚举模块。
//!
//! 本模块定义了在机控客户端多个组件之间共享的通用枚举类型。
//! 这些枚举旨在提供类型安全，并确保对于如操作员角色、配方状态等概念
//! 在整个系统中有一致的表示。
//!
//! 所有在此模块中定义的枚举都应派生 `Serialize`, `Deserialize`, `Debug`, `Clone`,
//! `PartialEq`, `Eq`, `Hash` (如果适合作为 HashMap/HashSet 的键)
//! 以支持数据交换、调试、实例复制、比较和集合操作。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 表示已登录操作员在系统中所扮演的角色。
///
/// 角色由控制器在认证响应中下发，客户端据此决定哪些指令可用。
/// 线上表示为 snake_case 字符串（例如 `"recipe_editor"`）。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperatorRole {
    /// 管理员：可执行全部指令，包括修改 PIN 码。
    Admin,
    /// 配方编辑员：可编辑、保存与删除配方，并可启停执行。
    RecipeEditor,
    /// 配方操作员：仅可启动/停止/暂停/恢复配方以及确认步骤。
    RecipeStarter,
    /// 观察者：只读访问，不可下发任何需要认证的指令。
    Observer,
}

// 为 OperatorRole 实现 Display trait，便于日志输出
impl fmt::Display for OperatorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 使用 Debug 格式化，它已经为我们生成了枚举成员的名称字符串
        write!(f, "{:?}", self)
    }
}

/// 枚举：配方在控制器上的执行状态。
///
/// 实时视图 (`LiveViewState`) 与历史执行记录 (`ExecutionRecord`) 共用此状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipeStatus {
    /// 空闲，没有加载任何配方。
    Idle,
    /// 配方已加载但尚未启动。
    Loaded,
    /// 正在执行。
    Running,
    /// 已暂停。
    Paused,
    /// 当前步骤等待操作员确认。
    WaitingForAck,
    /// 执行正常结束。
    Completed,
    /// 执行被操作员中止。
    Aborted,
    /// 执行因控制器错误终止。
    Error,
}

impl fmt::Display for RecipeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
