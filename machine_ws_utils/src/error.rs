// machine_ws_utils/src/error.rs

//! 定义 WebSocket 传输工具库相关的错误类型。

use thiserror::Error; // 引入 thiserror 来简化错误类型的定义

/// 传输工具库的统一错误类型。
#[derive(Error, Debug)]
pub enum LinkError {
    /// 当入站帧短于 4 字节的命名空间前缀时返回。
    /// 包含实际收到的字节数。
    #[error("帧过短: 实际 {actual} 字节，至少需要 4 字节命名空间前缀")]
    FrameTooShort { actual: usize },

    /// WebSocket 协议相关的错误。
    /// 例如，连接问题、消息格式不正确等。
    #[error("WebSocket协议错误: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    /// 无效的 URL 格式。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 收到不符合协议预期的消息（例如二进制协议上的文本消息）。
    #[error("消息错误: {0}")]
    Message(String),
}

/// 二进制时序数据格式错误。
///
/// 与 `LinkError` 分开定义：格式错误由解码调用方捕获并将数据视为不可用，
/// 不影响连接本身。版本号不匹配只记录警告，不属于此错误类型。
#[derive(Error, Debug)]
pub enum TimeSeriesFormatError {
    /// 缓冲区非空但不足以容纳头部（魔数 + 版本 + 序列数，共 9 字节）。
    #[error("时序数据缓冲区过短: 实际 {actual} 字节，头部至少需要 9 字节")]
    BufferTooShort { actual: usize },

    /// 魔数不匹配。包含实际读到的值，便于定位数据来源问题。
    #[error("时序数据魔数不匹配: 实际 0x{found:08X}，期望 0x{expected:08X}")]
    BadMagic { found: u32, expected: u32 },

    /// 某个长度字段声明的数据超出了缓冲区剩余字节数。
    #[error("时序数据在字段 '{field}' 处被截断: 需要 {need} 字节，剩余 {remaining} 字节")]
    Truncated {
        field: &'static str,
        need: usize,
        remaining: usize,
    },

    /// 序列名或单位不是合法的 UTF-8。
    #[error("时序数据字段 '{field}' 不是合法的 UTF-8: {source}")]
    InvalidUtf8 {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },
}
