// machine_control_client/src/config.rs

//! 机控客户端配置管理模块。
//!
//! 本模块负责定义应用所需的核心配置参数 (`AppConfig` 结构体)，
//! 提供加载、保存这些配置到持久化存储 (指定目录下的 `app_config.json` 文件)
//! 的功能，并处理默认配置的生成。它还包含了相关的单元测试以确保
//! 配置管理的健壮性。

use crate::error::ClientError;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// 配置文件名。
const CONFIG_FILE_NAME: &str = "app_config.json";

/// 应用配置结构体定义，对应于配置文件 (`app_config.json`) 中的内容。
///
/// 此结构体封装了机控客户端核心运行所需的各项配置参数。
/// 通过序列化和反序列化 (分别使用 `Serialize` 和 `Deserialize` trait)，
/// `AppConfig` 的实例可以方便地从 JSON 文件加载或保存到 JSON 文件。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// 控制器 WebSocket 端点的完整 URL 地址。
    /// 例如: `"ws://192.168.4.1:8080/ws"`
    pub controller_ws_url: String,

    /// 应用的日志记录级别。
    /// 有效值通常包括 (但不限于): `"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`。
    pub log_level: String,

    /// 布尔值，指示核心在初始化时是否应自动尝试连接到配置的控制器端点。
    /// - `true`: 初始化时自动连接。
    /// - `false`: 初始化时不自动连接，由外层在合适的时机手动触发连接。
    pub auto_connect: bool,

    /// 锁定请求的默认超时时间，单位为毫秒 (ms)。
    /// 发送指令时未显式指定锁定时间的调用方使用此值。
    pub default_lock_timeout_ms: u32,

    /// 会话与目录缓存等本地持久化数据的存储目录。
    pub storage_dir: PathBuf,
}

/// 为 `AppConfig` (应用配置) 提供默认值实现。
///
/// 当无法从配置文件加载现有配置 (例如，首次启动应用，或配置文件损坏/丢失时)，
/// `AppConfig::default()` 将被调用以生成一套基础的、可工作的默认配置参数。
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            controller_ws_url: "ws://localhost:8080/ws".to_string(), // 默认控制器端点 (指向本地)
            log_level: "info".to_string(),                           // 默认日志级别设置为 "info"
            auto_connect: true,                                      // 默认在初始化时自动连接
            default_lock_timeout_ms: 5000,                           // 默认锁定超时 5 秒
            storage_dir: PathBuf::from("./machine_control_data"),    // 默认存储目录
        }
    }
}

/// 加载应用程序的配置信息。
///
/// 此函数的核心逻辑是：
/// 1. 在 `config_dir` 下确定配置文件的预期完整路径 (`app_config.json`)。
/// 2. 检查该配置文件是否存在。
///    a. 如果配置文件存在，则尝试读取其内容，并使用 `serde_json` 将 JSON
///       字符串反序列化为 `AppConfig` 结构体实例。
///    b. 如果配置文件不存在，则记录一条提示信息，创建一个包含默认值的
///       `AppConfig` 实例，将其保存到预期的配置文件路径以便后续启动时
///       可以加载，然后返回这个默认配置实例。
///
/// # 参数
/// * `config_dir`: 配置文件所在的目录。
///
/// # 返回值
/// * `Result<AppConfig, ClientError>`:
///   - `Ok(AppConfig)`: 成功加载了现有的配置，或成功创建并保存了默认配置。
///   - `Err(ClientError::ConfigError)`: 加载或创建配置的过程中发生任何错误
///     (文件读取失败、JSON解析失败、无法创建配置目录、保存默认配置失败等)。
pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, ClientError> {
    let config_file_path = config_dir.join(CONFIG_FILE_NAME);

    if config_file_path.exists() {
        // 配置文件存在，尝试读取并解析
        let config_content = fs::read_to_string(&config_file_path).map_err(|e| {
            ClientError::ConfigError(format!("读取配置文件 '{}' 失败: {}", config_file_path.display(), e))
        })?;
        let app_config: AppConfig = serde_json::from_str(&config_content).map_err(|e| {
            ClientError::ConfigError(format!("解析配置文件 '{}' 的内容失败: {}", config_file_path.display(), e))
        })?;
        Ok(app_config)
    } else {
        // 配置文件不存在，使用默认值创建并保存
        info!(
            "[MachControlClient] 配置文件 '{}' 未找到，将使用默认配置参数创建新文件。",
            config_file_path.display()
        );
        let default_config = AppConfig::default();
        save_app_config(config_dir, &default_config)?;
        Ok(default_config)
    }
}

/// 保存应用程序的配置信息。
///
/// 将给定的 `AppConfig` 对象序列化为人类可读的 JSON 格式 (使用
/// `to_string_pretty`)，然后写入到 `config_dir` 下的配置文件。
/// 写入之前会确保目录存在，不存在时递归创建。
///
/// # 参数
/// * `config_dir`: 配置文件所在的目录。
/// * `app_config`: 需要被保存到文件的应用配置对象的引用。
pub fn save_app_config(config_dir: &Path, app_config: &AppConfig) -> Result<(), ClientError> {
    fs::create_dir_all(config_dir).map_err(|e| {
        ClientError::ConfigError(format!("创建配置目录 '{}' 失败: {}", config_dir.display(), e))
    })?;
    let config_file_path = config_dir.join(CONFIG_FILE_NAME);
    let config_json = serde_json::to_string_pretty(app_config)
        .map_err(|e| ClientError::ConfigError(format!("序列化应用配置失败: {}", e)))?;
    fs::write(&config_file_path, config_json).map_err(|e| {
        ClientError::ConfigError(format!("写入配置文件 '{}' 失败: {}", config_file_path.display(), e))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// 辅助函数：为每个测试创建独立的临时配置目录。
    fn temp_config_dir() -> PathBuf {
        std::env::temp_dir().join(format!("machine_control_config_test_{}", Uuid::new_v4()))
    }

    #[test]
    /// 测试配置文件不存在时：应创建并返回默认配置，且文件被写入磁盘。
    fn test_load_creates_default_config_when_missing() {
        let dir = temp_config_dir();
        let loaded = load_app_config(&dir).expect("首次加载配置失败");
        assert_eq!(loaded, AppConfig::default(), "首次加载应返回默认配置");
        assert!(dir.join(CONFIG_FILE_NAME).exists(), "默认配置应被写入磁盘");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    /// 测试保存后再次加载：应得到与保存内容一致的配置。
    fn test_save_then_load_roundtrip() {
        let dir = temp_config_dir();
        let mut config = AppConfig::default();
        config.controller_ws_url = "ws://10.0.0.2:9000/ws".to_string();
        config.default_lock_timeout_ms = 2500;
        save_app_config(&dir, &config).expect("保存配置失败");

        let loaded = load_app_config(&dir).expect("重新加载配置失败");
        assert_eq!(loaded, config, "重新加载的配置与保存的配置不相等");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    /// 测试损坏的配置文件：应返回 `ConfigError` 而不是 panic。
    fn test_load_corrupt_config_returns_error() {
        let dir = temp_config_dir();
        fs::create_dir_all(&dir).expect("创建临时目录失败");
        fs::write(dir.join(CONFIG_FILE_NAME), "{ 这不是合法的JSON ").expect("写入损坏文件失败");
        let result = load_app_config(&dir);
        assert!(
            matches!(result, Err(ClientError::ConfigError(_))),
            "损坏的配置文件应返回 ConfigError"
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
