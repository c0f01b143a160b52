// common_models/src/timeseries_models.rs

//! 传感器时序数据的共享模型。
//!
//! 一次执行期间记录的传感器数据以"序列"组织：每条序列有传感器名、单位，
//! 以及按时间排列的 (时间戳, 值) 采样点。该结构既是二进制时序编解码器的
//! 解码结果，也对应控制器以 JSON 形式下发的 `timeseries` 消息。

use serde::{Deserialize, Serialize};

/// 单个采样点。时间戳为绝对 Unix epoch 毫秒 (UTC)。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: f32,
}

/// 一条命名的、带单位的传感器采样序列。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorSeries {
    /// 传感器名称。
    pub sensor_name: String,
    /// 物理单位（例如 "℃", "kPa"），可为空字符串。
    pub unit: String,
    /// 采样点，按时间升序。
    pub data_points: Vec<DataPoint>,
}

/// 一次执行关联的全部时序数据。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesData {
    /// 所属执行的标识。
    pub execution_id: String,
    /// 各传感器的采样序列。
    pub series: Vec<SensorSeries>,
}
