// machine_ws_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 本模块提供了 `machine_ws_utils` 库中用于客户端 WebSocket 通信的主要功能。
//! 它包括建立与控制器的连接、发送和接收命名空间封装的二进制帧 (`Frame`)，
//! 以及将底层连接事件抽象为 [`Incoming`] 枚举。
//! 其设计旨在简化客户端应用程序与嵌入式控制器的异步交互。

use crate::error::LinkError;
use crate::frame::Frame;
use futures_util::{
    stream::{SplitSink, SplitStream}, // 用于将 WebSocket 流拆分为发送端和接收端
    SinkExt,   // 为 Sink（如 SplitSink）提供额外的方法，如 send()
    StreamExt, // 为 Stream（如 SplitStream）提供额外的方法，如 next()
};
use log::{debug, error, info};
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message, // 底层 WebSocket 消息枚举 (Text, Binary, Ping, Pong, Close)
    tungstenite::Error as TungsteniteError,
    WebSocketStream,
};
use url::Url;

/// `ClientWsStream` 类型别名，代表一个可能经过 TLS 加密的 TCP WebSocket 流。
/// 这是 `tokio-tungstenite` 库在客户端连接成功后返回的典型流类型。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 接收端的发送端/接收端类型别名，供上层存储使用。
pub type ClientWsSender = SplitSink<ClientWsStream, Message>;
pub type ClientWsReceiver = SplitStream<ClientWsStream>;

/// 从接收流中抽象出的一次入站事件。
///
/// 与直接暴露底层 `tungstenite::Message` 相比，这里只保留上层关心的三类事件：
/// 业务帧、心跳 Pong 以及连接关闭（携带关闭码，便于上层区分正常/异常关闭）。
#[derive(Debug)]
pub enum Incoming {
    /// 一条已解封的业务帧。
    Frame(Frame),
    /// 对我方 Ping 的 Pong 回复，用于心跳活性判断。
    Pong,
    /// 对方发来 Close 帧。`code` 为关闭码（1000 表示正常关闭），
    /// 缺失时表示对方未附带关闭码。
    Closed { code: Option<u16> },
}

/// `ClientConnection` 结构体代表一个活动的客户端 WebSocket 连接。
///
/// 它封装了与控制器进行通信所需的发送端 (`SplitSink`) 和接收端 (`SplitStream`)。
/// 实例通常在成功连接到控制器后创建。
pub struct ClientConnection {
    /// 用于向控制器异步发送消息的 `Sink` (发送端)。
    pub ws_sender: ClientWsSender,
    /// 用于从控制器异步接收消息的 `Stream` (接收端)。
    /// (字段设为 `pub` 以便上层将收发两端拆分到不同的异步任务中。)
    pub ws_receiver: ClientWsReceiver,
}

impl ClientConnection {
    /// 异步向控制器发送一帧。
    ///
    /// 帧被编码为命名空间前缀的二进制消息后通过 WebSocket 发送。
    ///
    /// # 参数
    /// * `frame` - 要发送的 `Frame` 实例的引用。
    ///
    /// # 返回
    /// * `Result<(), LinkError>` - 发送过程中发生网络错误时返回相应的 `LinkError`。
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), LinkError> {
        debug!(
            "[machine_ws_utils] 客户端：准备发送帧 (命名空间: {}, 负载: {} 字节)",
            frame.namespace,
            frame.payload.len()
        );
        self.ws_sender.send(Message::Binary(frame.encode())).await?;
        Ok(())
    }
}

/// 异步连接到指定的 WebSocket 控制器端点。
///
/// 此函数尝试解析给定的 URL 字符串，然后使用 `tokio-tungstenite` 的
/// `connect_async` 方法建立连接。如果连接和握手成功，它会将返回的
/// `WebSocketStream` 分割成发送端和接收端，并封装在 `ClientConnection` 中返回。
///
/// # 参数
/// * `url_str` - 控制器的完整 URL 字符串 (例如 "ws://192.168.1.10:8080/ws")。
///
/// # 返回
/// * `Result<ClientConnection, LinkError>` - URL 解析失败、连接失败或
///   WebSocket 握手过程中发生错误时，返回相应的 `LinkError`。
pub async fn connect_client(url_str: String) -> Result<ClientConnection, LinkError> {
    info!("[machine_ws_utils] 客户端：开始尝试连接到控制器，URL: {}", url_str);
    let parsed_url = Url::parse(&url_str)
        .map_err(|e| LinkError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!(
                "[machine_ws_utils] 客户端：已成功连接到 {} (HTTP 状态码: {})",
                url_str,
                response.status()
            );
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("[machine_ws_utils] 客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(LinkError::WebSocketProtocolError(e))
        }
    }
}

/// 从给定的 WebSocket 接收流中异步接收一次入站事件。
///
/// 此函数处理单个传入的 WebSocket 消息：二进制消息被解封为业务帧；
/// Pong 帧作为心跳事件上抛；Close 帧携带关闭码上抛；Ping 帧由底层库
/// 自动回复，在此跳过。文本消息不属于本协议，视为错误。
///
/// **注意：** 在一个持续的客户端会话中，调用方通常需要在一个循环中
/// 重复调用此函数来处理所有传入的事件。
///
/// # 返回
/// * `Option<Result<Incoming, LinkError>>`:
///     - `Some(Ok(incoming))`：成功接收到一次入站事件；
///     - `Some(Err(link_error))`：接收或解封过程中发生错误
///       （例如帧过短、收到非预期类型的消息）；
///     - `None`：接收流已结束（连接已彻底关闭）。
pub async fn receive_incoming(
    ws_receiver: &mut ClientWsReceiver,
) -> Option<Result<Incoming, LinkError>> {
    loop {
        match ws_receiver.next().await {
            Some(msg_result) => match msg_result {
                Ok(msg) => match msg {
                    Message::Binary(bin) => {
                        debug!("[machine_ws_utils] 客户端：收到二进制消息，长度: {} 字节", bin.len());
                        break Some(Frame::decode(&bin).map(Incoming::Frame));
                    }
                    Message::Text(text) => {
                        // 本协议的所有业务消息都是命名空间封装的二进制帧
                        debug!("[machine_ws_utils] 客户端：收到非预期的文本消息: '{}'", text);
                        break Some(Err(LinkError::Message(
                            "客户端收到了非预期的 WebSocket 文本消息".to_string(),
                        )));
                    }
                    Message::Ping(ping_data) => {
                        // Ping 帧由 tokio-tungstenite 自动响应 Pong，应用层无需特殊处理
                        debug!("[machine_ws_utils] 客户端：收到 Ping 控制帧，数据: {:?}", ping_data);
                    }
                    Message::Pong(_) => {
                        debug!("[machine_ws_utils] 客户端：收到 Pong 控制帧。");
                        break Some(Ok(Incoming::Pong));
                    }
                    Message::Close(close_frame) => {
                        debug!("[machine_ws_utils] 客户端：收到 Close 控制帧，详细信息: {:?}", close_frame);
                        let code = close_frame.map(|f| u16::from(f.code));
                        break Some(Ok(Incoming::Closed { code }));
                    }
                    Message::Frame(_) => {
                        // Frame 是一个更底层的原始帧类型，通常不应在应用层面直接处理
                        debug!("[machine_ws_utils] 客户端：收到非预期的底层原始 Frame 类型消息，正在跳过。");
                    }
                },
                Err(e) => match e {
                    TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed => {
                        debug!("[machine_ws_utils] 客户端：连接已关闭 (在接收期间检测到)。");
                        break None;
                    }
                    _ => {
                        error!("[machine_ws_utils] 客户端：从 WebSocket 流接收消息时发生底层错误: {}", e);
                        break Some(Err(LinkError::WebSocketProtocolError(e)));
                    }
                },
            },
            None => {
                debug!("[machine_ws_utils] 客户端：WebSocket 接收流已结束。");
                break None;
            }
        }
    }
}
