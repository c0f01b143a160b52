// machine_ws_utils/src/frame.rs

//! 命名空间前缀的二进制线上信封。
//!
//! 单条物理 WebSocket 连接上复用多个逻辑通道：每条消息的前 4 字节为
//! 小端序的 32 位无符号命名空间标识，其后紧跟不透明的负载字节。
//! 没有长度字段——帧边界即底层传输的消息边界；也没有校验和，
//! 完整性由底层传输保证。

use crate::error::LinkError;
use byteorder::{ByteOrder, LittleEndian};

/// 命名空间前缀的长度（字节）。
pub const NAMESPACE_PREFIX_LEN: usize = 4;

/// 一条已解封的线上消息：逻辑命名空间 + 不透明负载。
///
/// 负载的编码由命名空间决定（配方管理命名空间为 JSON，
/// 结构化指令命名空间为模式化的二进制信封），本层不做解释。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 逻辑通道标识。
    pub namespace: u32,
    /// 不透明负载，允许为空。
    pub payload: Vec<u8>,
}

impl Frame {
    /// 构造一个新帧。
    pub fn new(namespace: u32, payload: Vec<u8>) -> Self {
        Self { namespace, payload }
    }

    /// 将帧编码为线上字节序列。
    ///
    /// 分配 `4 + payload.len()` 字节：偏移 0 处写入小端序命名空间，
    /// 偏移 4 起拷贝负载。
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; NAMESPACE_PREFIX_LEN + self.payload.len()];
        LittleEndian::write_u32(&mut buf[..NAMESPACE_PREFIX_LEN], self.namespace);
        buf[NAMESPACE_PREFIX_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// 从线上字节序列解码一帧。
    ///
    /// # 返回
    /// * `Err(LinkError::FrameTooShort)` - 输入不足 4 字节时返回，
    ///   包含实际字节数；
    /// * `Ok(Frame)` - 其余情况。负载为命名空间前缀之后的全部字节，
    ///   可能为零长度。
    pub fn decode(data: &[u8]) -> Result<Frame, LinkError> {
        if data.len() < NAMESPACE_PREFIX_LEN {
            return Err(LinkError::FrameTooShort { actual: data.len() });
        }
        let namespace = LittleEndian::read_u32(&data[..NAMESPACE_PREFIX_LEN]);
        Ok(Frame {
            namespace,
            payload: data[NAMESPACE_PREFIX_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 测试编码布局：小端序命名空间前缀 + 原样负载。
    fn test_encode_layout() {
        let frame = Frame::new(0x0102_0304, vec![0xAA, 0xBB]);
        let encoded = frame.encode();
        assert_eq!(encoded.len(), 6, "编码后的长度应为 4 + 负载长度");
        // 小端序：最低有效字节在前
        assert_eq!(&encoded[..4], &[0x04, 0x03, 0x02, 0x01], "命名空间前缀应为小端序");
        assert_eq!(&encoded[4..], &[0xAA, 0xBB], "负载应紧随命名空间前缀且保持原样");
    }

    #[test]
    /// 测试编解码往返：对边界命名空间取值与不同负载长度，decode(encode(f)) == f。
    fn test_encode_decode_roundtrip() {
        let namespaces = [0u32, 1, common_models::ws_payloads::RECIPE_NAMESPACE, u32::MAX];
        let payloads: [&[u8]; 3] = [&[], &[0x00], &[1, 2, 3, 4, 5, 6, 7, 8, 9]];
        for &namespace in &namespaces {
            for payload in &payloads {
                let frame = Frame::new(namespace, payload.to_vec());
                let decoded = Frame::decode(&frame.encode())
                    .expect("对合法编码结果的解码不应失败");
                assert_eq!(decoded, frame,
                           "命名空间 {} / 负载长度 {} 的往返结果与原帧不相等",
                           namespace, payload.len());
            }
        }
    }

    #[test]
    /// 测试零长度负载：恰好 4 字节的输入应解码为空负载帧，而非错误。
    fn test_decode_empty_payload() {
        let decoded = Frame::decode(&[0x05, 0x00, 0x00, 0x00]).expect("4 字节输入的解码不应失败");
        assert_eq!(decoded.namespace, 5, "命名空间解析不正确");
        assert!(decoded.payload.is_empty(), "负载应为空");
    }

    #[test]
    /// 测试过短输入：不足 4 字节时应返回 `FrameTooShort`，并报告实际长度。
    fn test_decode_too_short() {
        for len in 0..NAMESPACE_PREFIX_LEN {
            let data = vec![0u8; len];
            match Frame::decode(&data) {
                Err(LinkError::FrameTooShort { actual }) => {
                    assert_eq!(actual, len, "FrameTooShort 报告的实际长度不正确");
                }
                other => panic!("长度为 {} 的输入应返回 FrameTooShort，实际为 {:?}", len, other),
            }
        }
    }
}
