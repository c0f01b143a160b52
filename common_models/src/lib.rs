//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了在机控客户端各个 Rust 组件（`machine_ws_utils` 传输工具库、
//! `machine_control_client` 客户端核心）以及潜在的 Web 前端（通过 TypeScript 类型对应）
//! 之间共享的核心数据结构和枚举类型。
//!
//! 主要包含以下类型的模型：
//! - **配方模型 (`recipe_models`)**: 配方、配方步骤、全局参数以及可用步骤类型目录。
//! - **执行模型 (`execution_models`)**: 实时执行视图与历史执行记录。
//! - **时序数据模型 (`timeseries_models`)**: 传感器时序数据（序列、数据点）。
//! - **会话模型 (`session`)**: 登录会话（令牌 + 角色）。
//! - **WebSocket 消息负载 (`ws_payloads`)**: 入站消息的判别字符串常量与负载结构体，
//!   以及出站指令 (`ClientCommand`) 的类型化定义。
//! - **通用枚举 (`enums`)**: 操作员角色、配方状态等，以保证类型安全和一致性。
//!
//! 设计原则：
//! - **共享性**: 所有在此 crate 中定义的模型都旨在被多个其他 crate 共享使用。
//! - **序列化/反序列化**: 所有模型（结构体和枚举）都必须派生 `serde::Serialize` 和
//!   `serde::Deserialize` traits，以便能够轻松地在 JSON 与 Rust 结构之间转换。
//!   控制器侧的线上 JSON 字段名为 camelCase，相应结构体通过
//!   `#[serde(rename_all = "camelCase")]` 对齐。
//! - **可调试性与克隆**: 所有模型也必须派生 `Debug` 和 `Clone` traits。

pub mod enums;
pub mod execution_models;
pub mod recipe_models;
pub mod session;
pub mod timeseries_models;
pub mod ws_payloads;

pub use enums::{OperatorRole, RecipeStatus};
pub use session::Session;
