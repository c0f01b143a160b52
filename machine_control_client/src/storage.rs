// machine_control_client/src/storage.rs

//! 本地持久化存储模块。
//!
//! 为会话令牌与配方/步骤目录缓存提供一个简单的 JSON 文件存储：
//! 每个条目一个文件，内容为对应模型的 JSON 序列化结果。
//! 会话在重启后恢复；目录缓存在控制器不可达时作为降级数据源，
//! 每次收到权威数据时被覆盖（包括空列表导致的清空）。

use crate::error::ClientError;
use log::warn;
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::PathBuf};

/// 会话条目名。
pub const SESSION_ENTRY: &str = "session";
/// 可用配方目录缓存条目名。
pub const AVAILABLE_RECIPES_ENTRY: &str = "available_recipes";
/// 可用步骤类型目录缓存条目名。
pub const AVAILABLE_STEPS_ENTRY: &str = "available_steps";

/// 基于 JSON 文件的键值存储。
///
/// 读取失败（文件缺失、内容损坏）一律降级为"无数据"并记录警告，
/// 不向调用方传播错误——本地缓存永远不应阻断核心流程。
/// 写入失败返回 [`ClientError::StorageError`]，由调用方决定是否忽略。
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// 以指定目录创建存储实例。目录在首次写入时按需创建。
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, entry: &str) -> PathBuf {
        self.dir.join(format!("{}.json", entry))
    }

    /// 读取并反序列化一个条目。
    ///
    /// 条目不存在、读取失败或内容无法解析时返回 `None`（后两种情况记录警告）。
    pub fn load<T: DeserializeOwned>(&self, entry: &str) -> Option<T> {
        let path = self.entry_path(entry);
        if !path.exists() {
            return None;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("[MachControlClient] 读取存储条目 '{}' 失败: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("[MachControlClient] 解析存储条目 '{}' 失败: {}", path.display(), e);
                None
            }
        }
    }

    /// 序列化并写入一个条目（整体覆盖）。
    pub fn save<T: Serialize>(&self, entry: &str, value: &T) -> Result<(), ClientError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            ClientError::StorageError(format!("创建存储目录 '{}' 失败: {}", self.dir.display(), e))
        })?;
        let path = self.entry_path(entry);
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| ClientError::StorageError(format!("序列化存储条目 '{}' 失败: {}", entry, e)))?;
        fs::write(&path, content).map_err(|e| {
            ClientError::StorageError(format!("写入存储条目 '{}' 失败: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// 删除一个条目。条目不存在时静默成功。
    pub fn remove(&self, entry: &str) -> Result<(), ClientError> {
        let path = self.entry_path(entry);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                ClientError::StorageError(format!("删除存储条目 '{}' 失败: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}
