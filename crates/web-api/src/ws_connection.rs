use std::ops::ControlFlow;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{ClientEvent, ConnectionId, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;

/// WebSocket 连接
///
/// 一个 WebSocket 会话对应一个连接标识。入站帧在接收任务里按顺序交给分发器，
/// 所以同一连接上的事件不会并发处理；出站事件由发送任务写回套接字。
pub struct WebSocketConnection {
    state: AppState,
    connection_id: ConnectionId,
    events: mpsc::Receiver<ServerEvent>,
}

impl WebSocketConnection {
    pub async fn open(state: AppState) -> Self {
        let (connection_id, events) = state.dispatcher.connect().await;
        Self {
            state,
            connection_id,
            events,
        }
    }

    /// 运行连接主循环，直到任一方向结束，然后注销并离开所有房间
    pub async fn run(self, socket: WebSocket) {
        let Self {
            state,
            connection_id,
            mut events,
        } = self;
        let (mut sender, mut incoming) = socket.split();

        // 发送任务：把出站事件序列化后写回客户端
        let mut send_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let payload = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to serialize websocket payload");
                        continue;
                    }
                };
                if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                    tracing::debug!(connection_id = %connection_id, "写入失败，发送任务结束");
                    break;
                }
            }
        });

        // 接收任务：逐条处理客户端消息
        let recv_state = state.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(message)) = incoming.next().await {
                if Self::handle_incoming(&recv_state, connection_id, message)
                    .await
                    .is_break()
                {
                    break;
                }
            }
        });

        // 等被中止的任务真正结束，再注销连接
        tokio::select! {
            _ = &mut send_task => {
                recv_task.abort();
                let _ = recv_task.await;
            }
            _ = &mut recv_task => {
                send_task.abort();
                let _ = send_task.await;
            }
        }

        state.dispatcher.disconnect(connection_id).await;
    }

    async fn handle_incoming(
        state: &AppState,
        connection_id: ConnectionId,
        message: WsMessage,
    ) -> ControlFlow<()> {
        match message {
            WsMessage::Text(text) => {
                match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => {
                        // 失败已经推送给该连接并记录日志
                        let _ = state.dispatcher.dispatch(connection_id, event).await;
                    }
                    Err(err) => {
                        tracing::warn!(connection_id = %connection_id, error = %err, "无法解析的客户端消息");
                        state
                            .dispatcher
                            .report(connection_id, "INVALID_EVENT", err.to_string())
                            .await;
                    }
                }
            }
            WsMessage::Binary(_) => {
                state
                    .dispatcher
                    .report(
                        connection_id,
                        "INVALID_EVENT",
                        "binary frames are not supported".to_string(),
                    )
                    .await;
            }
            // 底层会自动回复 pong
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Close(_) => {
                tracing::debug!(connection_id = %connection_id, "WebSocket收到关闭消息");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}
