#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{
    ConnectionHub, ConnectionRegistry, Dispatcher, DispatcherDependencies, HistoryService,
    InMemoryMessageStore, RoomMembership, SystemClock,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<ConnectionRegistry>,
    pub membership: Arc<RoomMembership>,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("websocket connect");
        socket
    }
}

/// 使用内存消息存储启动完整路由
pub async fn spawn_server() -> TestServer {
    let store = Arc::new(InMemoryMessageStore::new());
    let registry = Arc::new(ConnectionRegistry::new());
    let membership = Arc::new(RoomMembership::new());
    let dispatcher = Dispatcher::new(DispatcherDependencies {
        registry: registry.clone(),
        membership: membership.clone(),
        hub: Arc::new(ConnectionHub::new()),
        repository: store.clone(),
        clock: Arc::new(SystemClock),
    });
    let history = HistoryService::new(store, 50, 200);
    let state = AppState::new(Arc::new(dispatcher), Arc::new(history), vec!["*".into()]);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router(state).into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        addr,
        registry,
        membership,
        _shutdown: shutdown_tx,
    }
}

pub async fn send(socket: &mut Socket, frame: Value) {
    socket
        .send(TungsteniteMessage::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// 下一条文本帧，超时返回 None
pub async fn next_event(socket: &mut Socket) -> Option<Value> {
    loop {
        let frame = timeout(Duration::from_secs(2), socket.next()).await.ok()??;
        match frame.expect("websocket frame") {
            TungsteniteMessage::Text(text) => {
                return Some(serde_json::from_str(text.as_str()).expect("json frame"))
            }
            TungsteniteMessage::Close(_) => return None,
            _ => continue,
        }
    }
}

/// 等待该连接之前发出的事件全部处理完
///
/// 同一连接上的事件按顺序处理，发一条未知事件并等到它的 INVALID_EVENT 回复即可。
/// 返回回复之前收到的其它事件。
pub async fn flush(socket: &mut Socket) -> Vec<Value> {
    send(socket, json!({"event": "flush"})).await;
    let mut before = Vec::new();
    loop {
        let event = next_event(socket).await.expect("flush reply");
        if event["event"] == "error" && event["data"]["code"] == "INVALID_EVENT" {
            return before;
        }
        before.push(event);
    }
}

/// 注册身份并加入房间，返回时服务端已处理完
pub async fn member(server: &TestServer, username: &str, rooms: &[&str]) -> Socket {
    let mut socket = server.connect().await;
    send(&mut socket, json!({"event": "register_user", "data": username})).await;
    for room in rooms {
        send(&mut socket, json!({"event": "join_room", "data": room})).await;
    }
    assert!(flush(&mut socket).await.is_empty());
    socket
}
