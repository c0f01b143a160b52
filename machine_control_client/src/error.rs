// machine_control_client/src/error.rs

//! 定义客户端核心的错误类型。
//!
//! 注意：需要直达用户界面的故障（锁定超时、发送失败、异常断开等）
//! 通过 [`crate::event::UiNotifier`] 以副作用的形式通知，不作为
//! `Result` 错误向上传播；本模块的错误类型覆盖的是调用方可以
//! 程序化处理的失败。

use thiserror::Error;

/// 客户端核心的统一错误类型。
#[derive(Error, Debug)]
pub enum ClientError {
    /// 当指令或状态数据的 serde 序列化失败时返回。
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 配置文件读取、解析或写入失败。
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 本地持久化存储读写失败。
    #[error("存储错误: {0}")]
    StorageError(String),
}
