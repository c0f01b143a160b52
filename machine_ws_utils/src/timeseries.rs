// machine_ws_utils/src/timeseries.rs

//! 传感器历史数据的二进制格式编解码。
//!
//! 控制器以紧凑的二进制格式传输执行期间记录的传感器时序数据，
//! 相比 JSON 可显著降低大数据量历史曲线的传输体积。布局（整数均为小端序）：
//!
//! ```text
//! [0:4)   magic        u32   固定魔数，不匹配为格式错误
//! [4]     version      u8    版本号，不匹配仅记录警告
//! [5:9)   seriesCount  u32
//! 每条序列重复 seriesCount 次:
//!   nameLen  u32; name  UTF-8 字节 × nameLen
//!   unitLen  u32; unit  UTF-8 字节 × unitLen
//!   pointCount u32
//!   每个采样点重复 pointCount 次:
//!     relativeTimestamp u64   相对执行启动的毫秒数
//!     value             f32
//! ```
//!
//! 绝对时间戳 = 执行启动时间戳 + relativeTimestamp。
//! 没有 CRC；所有长度字段在读取前都做边界检查，声明长度超出剩余字节数
//! 时返回 [`TimeSeriesFormatError::Truncated`] 而不是越界读取。

use crate::error::TimeSeriesFormatError;
use byteorder::{ByteOrder, LittleEndian};
use common_models::timeseries_models::{DataPoint, SensorSeries, TimeSeriesData};
use log::warn;

/// 二进制时序格式的魔数（ASCII "DRST" 的小端序 u32 表示）。
pub const TIMESERIES_MAGIC: u32 = 0x5453_5244;

/// 当前支持的格式版本。
pub const TIMESERIES_VERSION: u8 = 1;

/// 头部长度：魔数 4 + 版本 1 + 序列数 4。
const HEADER_LEN: usize = 9;

/// 解码器内部游标，每次读取前检查剩余字节数。
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// 取出 `len` 字节，不足时返回 `Truncated`。
    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], TimeSeriesFormatError> {
        if self.remaining() < len {
            return Err(TimeSeriesFormatError::Truncated {
                field,
                need: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32, TimeSeriesFormatError> {
        Ok(LittleEndian::read_u32(self.take(4, field)?))
    }

    fn read_u64(&mut self, field: &'static str) -> Result<u64, TimeSeriesFormatError> {
        Ok(LittleEndian::read_u64(self.take(8, field)?))
    }

    fn read_f32(&mut self, field: &'static str) -> Result<f32, TimeSeriesFormatError> {
        Ok(LittleEndian::read_f32(self.take(4, field)?))
    }

    fn read_string(&mut self, field: &'static str) -> Result<String, TimeSeriesFormatError> {
        let len = self.read_u32(field)? as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| TimeSeriesFormatError::InvalidUtf8 { field, source: e })
    }
}

/// 将二进制时序数据解码为 [`TimeSeriesData`]。
///
/// # 参数
/// * `execution_id`: 数据所属执行的标识（来自外层消息，不在二进制格式内）。
/// * `start_time_ms`: 执行启动时间戳 (Unix epoch 毫秒)，用于将相对时间戳
///   换算为绝对时间戳。
/// * `data`: 二进制数据缓冲区。
///
/// # 返回
/// * 零长度输入解码为 `series = []`，不视为格式错误（控制器对没有任何
///   记录的执行会返回空缓冲区）；
/// * 非空但短于 9 字节的输入返回 [`TimeSeriesFormatError::BufferTooShort`]；
/// * 魔数不匹配返回 [`TimeSeriesFormatError::BadMagic`]（报告实际读到的值）；
/// * 版本号不匹配仅记录警告，继续解析；
/// * 解析完所有声明的序列后仍有未消费字节时记录警告（容忍尾部填充或
///   版本偏差），不视为错误。
pub fn decode_time_series(
    execution_id: &str,
    start_time_ms: i64,
    data: &[u8],
) -> Result<TimeSeriesData, TimeSeriesFormatError> {
    if data.is_empty() {
        return Ok(TimeSeriesData {
            execution_id: execution_id.to_string(),
            series: Vec::new(),
        });
    }
    if data.len() < HEADER_LEN {
        return Err(TimeSeriesFormatError::BufferTooShort { actual: data.len() });
    }

    let mut reader = Reader::new(data);

    let magic = reader.read_u32("magic")?;
    if magic != TIMESERIES_MAGIC {
        return Err(TimeSeriesFormatError::BadMagic {
            found: magic,
            expected: TIMESERIES_MAGIC,
        });
    }

    let version = reader.take(1, "version")?[0];
    if version != TIMESERIES_VERSION {
        warn!(
            "[machine_ws_utils] 时序数据版本号不匹配: 实际 {}，期望 {}。按当前版本布局继续解析。",
            version, TIMESERIES_VERSION
        );
    }

    let series_count = reader.read_u32("seriesCount")?;
    let mut series = Vec::with_capacity(series_count.min(1024) as usize);
    for _ in 0..series_count {
        let sensor_name = reader.read_string("name")?;
        let unit = reader.read_string("unit")?;
        let point_count = reader.read_u32("pointCount")?;
        let mut data_points = Vec::with_capacity(point_count.min(65536) as usize);
        for _ in 0..point_count {
            let relative_timestamp = reader.read_u64("relativeTimestamp")?;
            let value = reader.read_f32("value")?;
            data_points.push(DataPoint {
                timestamp: start_time_ms + relative_timestamp as i64,
                value,
            });
        }
        series.push(SensorSeries {
            sensor_name,
            unit,
            data_points,
        });
    }

    if reader.remaining() > 0 {
        // 来源侧是否有意为之尚不明确，保留宽容处理但让剩余量在日志中可见
        warn!(
            "[machine_ws_utils] 时序数据解析完 {} 条序列后仍有 {} 字节未消费，已忽略。",
            series_count,
            reader.remaining()
        );
    }

    Ok(TimeSeriesData {
        execution_id: execution_id.to_string(),
        series,
    })
}

/// 将时序数据编码为二进制格式。
///
/// `decode_time_series` 的逆操作：采样点的绝对时间戳以 `start_time_ms`
/// 为基准换算为相对毫秒数（早于启动时间的采样点取 0）。
pub fn encode_time_series(start_time_ms: i64, series: &[SensorSeries]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN);
    buf.extend_from_slice(&TIMESERIES_MAGIC.to_le_bytes());
    buf.push(TIMESERIES_VERSION);
    buf.extend_from_slice(&(series.len() as u32).to_le_bytes());
    for s in series {
        buf.extend_from_slice(&(s.sensor_name.len() as u32).to_le_bytes());
        buf.extend_from_slice(s.sensor_name.as_bytes());
        buf.extend_from_slice(&(s.unit.len() as u32).to_le_bytes());
        buf.extend_from_slice(s.unit.as_bytes());
        buf.extend_from_slice(&(s.data_points.len() as u32).to_le_bytes());
        for point in &s.data_points {
            let relative = (point.timestamp - start_time_ms).max(0) as u64;
            buf.extend_from_slice(&relative.to_le_bytes());
            buf.extend_from_slice(&point.value.to_le_bytes());
        }
    }
    buf
}
