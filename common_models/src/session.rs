// common_models/src/session.rs

//! 登录会话模型。

use crate::enums::OperatorRole;
use serde::{Deserialize, Serialize};

/// 一次已认证的操作员会话。
///
/// 由控制器在认证成功响应中下发，客户端持久化到本地存储，
/// 重新启动后恢复；注销或收到 401 时清除。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// 会话令牌，需认证的指令发送时随指令附带。
    pub token: String,
    /// 本会话的操作员角色。
    pub role: OperatorRole,
}
