//! `machine_ws_utils` 是为机控客户端提供 WebSocket 传输实用功能的 Rust Crate。
//! 它封装了与嵌入式控制器之间单条持久连接上的底层通信原语，
//! 特别关注与 `common_models` 一起使用时的消息封装和编解码。
//!
//! 主要模块包括：
//! - `frame`: 命名空间前缀的二进制线上信封（`Frame`）及其编解码。
//! - `timeseries`: 传感器历史数据的二进制格式编解码。
//! - `client`: 提供 WebSocket 客户端传输层（连接建立、帧收发）。
//! - `error`: 定义库中使用的错误类型，如 `LinkError` 和 `TimeSeriesFormatError`。

pub mod client;
pub mod error;
pub mod frame;
pub mod timeseries;
