// machine_ws_utils/tests/client_transport_integration_test.rs

//! 客户端传输层集成测试。
//!
//! 通过在本地回环地址上启动一个简易 WebSocket 回显服务来验证
//! `connect_client` / `send_frame` / `receive_incoming` 的端到端行为，
//! 包括二进制帧往返与关闭码的传递。

use futures_util::{SinkExt, StreamExt};
use log::{error, info};
use machine_ws_utils::client::transport::{connect_client, receive_incoming, Incoming};
use machine_ws_utils::frame::Frame;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Message;

/// 辅助函数：启动一个本地二进制回显服务器，返回其监听地址。
///
/// 该服务器将收到的任何二进制消息原样发回，收到 Close 帧时结束会话。
/// 监听端口由操作系统分配，避免与并行运行的其他测试冲突。
async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("绑定本地回显测试服务器失败");
    let addr = listener.local_addr().expect("获取回显测试服务器地址失败");
    tokio::spawn(async move {
        while let Ok((stream, peer_addr)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(e) => {
                        error!("[测试回显服务端] 与 {} 的握手失败: {}", peer_addr, e);
                        return;
                    }
                };
                info!("[测试回显服务端] 客户端 {} 已连接。", peer_addr);
                while let Some(Ok(msg)) = ws.next().await {
                    match msg {
                        Message::Binary(bin) => {
                            if ws.send(Message::Binary(bin)).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                info!("[测试回显服务端] 客户端 {} 会话结束。", peer_addr);
            });
        }
    });
    addr
}

/// 辅助函数：启动一个握手后立即以指定关闭码关闭连接的服务器。
async fn spawn_closing_server(close_code: CloseCode) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("绑定本地关闭测试服务器失败");
    let addr = listener.local_addr().expect("获取关闭测试服务器地址失败");
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("关闭测试服务器握手失败");
            let close_frame = CloseFrame {
                code: close_code,
                reason: "测试关闭".into(),
            };
            let _ = ws.send(Message::Close(Some(close_frame))).await;
        }
    });
    addr
}

#[tokio::test]
/// 集成测试：客户端连接、发送二进制帧并接收回显的完整流程。
async fn test_client_connect_send_receive_echo() {
    let _ = env_logger::builder().is_test(true).try_init();

    let addr = spawn_echo_server().await;
    let url = format!("ws://{}", addr);

    let mut conn = connect_client(url.clone())
        .await
        .unwrap_or_else(|e| panic!("连接到本地回显测试服务端 {} 失败: {}", url, e));

    let frame = Frame::new(
        common_models::ws_payloads::RECIPE_NAMESPACE,
        br#"{"command":"get_available_recipes"}"#.to_vec(),
    );
    conn.send_frame(&frame).await.expect("发送帧到回显服务端失败");

    match timeout(Duration::from_secs(5), receive_incoming(&mut conn.ws_receiver)).await {
        Ok(Some(Ok(Incoming::Frame(echoed)))) => {
            assert_eq!(echoed, frame, "回显的帧与发送的帧不相等");
        }
        Ok(other) => panic!("期望收到回显帧，实际为 {:?}", other),
        Err(_) => panic!("等待回显帧超时 (超过5秒)"),
    }
}

#[tokio::test]
/// 集成测试：对方以非正常关闭码关闭连接时，关闭码应被传递给上层。
async fn test_close_code_propagation() {
    let _ = env_logger::builder().is_test(true).try_init();

    let addr = spawn_closing_server(CloseCode::Away).await;
    let url = format!("ws://{}", addr);

    let mut conn = connect_client(url.clone())
        .await
        .unwrap_or_else(|e| panic!("连接到本地关闭测试服务端 {} 失败: {}", url, e));

    match timeout(Duration::from_secs(5), receive_incoming(&mut conn.ws_receiver)).await {
        Ok(Some(Ok(Incoming::Closed { code }))) => {
            assert_eq!(code, Some(1001), "上抛的关闭码与服务端发送的不一致");
        }
        Ok(other) => panic!("期望收到 Closed 事件，实际为 {:?}", other),
        Err(_) => panic!("等待 Closed 事件超时 (超过5秒)"),
    }
}
