// machine_ws_utils/src/client/mod.rs

//! WebSocket 客户端功能模块。
//!
//! 包含客户端连接建立、帧收发等核心功能。

pub mod transport;
