//! 入站事件分发
//!
//! 每种客户端事件对应一个处理函数。处理失败只向触发它的连接推送 `error` 事件，
//! 不影响其它连接和房间。

use std::sync::Arc;

use domain::{
    ClientEvent, ConnectionId, PrivateMessagePayload, PrivateStopTypingPayload,
    PrivateTypingPayload, RoomMessagePayload, RoomName, ServerEvent, StopTypingPayload,
    TypingPayload,
};
use tokio::sync::mpsc;

use crate::{
    broadcaster::Broadcaster,
    clock::Clock,
    error::ApplicationError,
    keyed_lock::KeyedLocks,
    local_broadcast::ConnectionHub,
    membership::RoomMembership,
    registry::ConnectionRegistry,
    repository::MessageRepository,
    services::{
        message_router::{MessageRouter, MessageRouterDependencies},
        typing_service::TypingCoordinator,
    },
};

pub struct DispatcherDependencies {
    pub registry: Arc<ConnectionRegistry>,
    pub membership: Arc<RoomMembership>,
    pub hub: Arc<ConnectionHub>,
    pub repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 同一连接上的事件与断开互斥执行，断开完成后不会再有该连接的状态写入。
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    membership: Arc<RoomMembership>,
    hub: Arc<ConnectionHub>,
    router: MessageRouter,
    typing: TypingCoordinator,
    connection_locks: KeyedLocks<ConnectionId>,
}

impl Dispatcher {
    pub fn new(deps: DispatcherDependencies) -> Self {
        let broadcaster: Arc<dyn Broadcaster> = deps.hub.clone();
        let router = MessageRouter::new(MessageRouterDependencies {
            registry: deps.registry.clone(),
            membership: deps.membership.clone(),
            repository: deps.repository,
            broadcaster: broadcaster.clone(),
            clock: deps.clock,
        });
        let typing =
            TypingCoordinator::new(deps.registry.clone(), deps.membership.clone(), broadcaster);

        Self {
            registry: deps.registry,
            membership: deps.membership,
            hub: deps.hub,
            router,
            typing,
            connection_locks: KeyedLocks::default(),
        }
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// 传输层建立连接：分配连接标识并返回出站事件流
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let connection = ConnectionId::new();
        let receiver = self.hub.attach(connection).await;
        let online = self.hub.connection_count().await;
        tracing::info!(connection_id = %connection, online, "连接已建立");
        (connection, receiver)
    }

    /// 处理一条入站事件，失败时向该连接推送 `error`
    ///
    /// 已断开的连接发来的迟到事件直接丢弃。
    pub async fn dispatch(
        &self,
        connection: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), ApplicationError> {
        let _guard = self.connection_locks.lock(&connection).await;
        if !self.hub.is_connected(connection).await {
            tracing::debug!(connection_id = %connection, event = event.kind(), "连接已断开，丢弃事件");
            return Ok(());
        }

        let kind = event.kind();
        let result = match event {
            ClientEvent::RegisterUser(username) => self.on_register(connection, username).await,
            ClientEvent::JoinRoom(room) => self.on_join(connection, room).await,
            ClientEvent::LeaveRoom(room) => self.on_leave(connection, room).await,
            ClientEvent::RoomMessage(payload) => self.on_room_message(connection, payload).await,
            ClientEvent::PrivateMessage(payload) => {
                self.on_private_message(connection, payload).await
            }
            ClientEvent::Typing(payload) => self.on_typing(connection, payload).await,
            ClientEvent::StopTyping(payload) => self.on_stop_typing(payload).await,
            ClientEvent::PrivateTyping(payload) => self.on_private_typing(payload).await,
            ClientEvent::PrivateStopTyping(payload) => self.on_private_stop_typing(payload).await,
        };

        if let Err(err) = &result {
            tracing::warn!(connection_id = %connection, event = kind, error = %err, "请求被拒绝");
            self.report(connection, err.code(), err.to_string()).await;
        }
        result
    }

    /// 只推送给单个连接的错误事件
    pub async fn report(&self, connection: ConnectionId, code: &str, message: String) {
        self.hub
            .send_to(&[connection], ServerEvent::error(code, message))
            .await;
    }

    /// 断开连接：注销身份并离开所有房间
    ///
    /// 等待该连接正在处理的事件结束后才执行。
    pub async fn disconnect(&self, connection: ConnectionId) {
        let _guard = self.connection_locks.lock(&connection).await;
        self.hub.detach(connection).await;
        let rooms = self.membership.leave_all(connection).await;
        let identity = self.registry.unregister(connection).await;
        let online = self.hub.connection_count().await;
        tracing::info!(
            connection_id = %connection,
            username = identity.as_ref().map(|u| u.as_str()).unwrap_or("-"),
            rooms = rooms.len(),
            online,
            "连接已断开"
        );
    }

    async fn on_register(
        &self,
        connection: ConnectionId,
        username: String,
    ) -> Result<(), ApplicationError> {
        let username = self.registry.register(connection, username).await?;
        tracing::info!(connection_id = %connection, username = %username, "Registered user");
        Ok(())
    }

    async fn on_join(&self, connection: ConnectionId, room: String) -> Result<(), ApplicationError> {
        let room = RoomName::parse(room).map_err(ApplicationError::InvalidRoom)?;
        if self.membership.join(connection, &room).await {
            tracing::info!(connection_id = %connection, room = %room, "User joined room");
        }
        Ok(())
    }

    async fn on_leave(&self, connection: ConnectionId, room: String) -> Result<(), ApplicationError> {
        let room = RoomName::parse(room).map_err(ApplicationError::InvalidRoom)?;
        if self.membership.leave(connection, &room).await {
            tracing::info!(connection_id = %connection, room = %room, "User left room");
        }
        Ok(())
    }

    async fn on_room_message(
        &self,
        connection: ConnectionId,
        payload: RoomMessagePayload,
    ) -> Result<(), ApplicationError> {
        self.check_claimed_sender(connection, payload.from_user.as_deref())
            .await;
        self.router
            .send_group(connection, &payload.room, payload.message)
            .await?;
        Ok(())
    }

    async fn on_private_message(
        &self,
        connection: ConnectionId,
        payload: PrivateMessagePayload,
    ) -> Result<(), ApplicationError> {
        self.check_claimed_sender(connection, payload.from_user.as_deref())
            .await;
        self.router
            .send_direct(connection, &payload.to_user, payload.message)
            .await?;
        Ok(())
    }

    async fn on_typing(
        &self,
        connection: ConnectionId,
        payload: TypingPayload,
    ) -> Result<(), ApplicationError> {
        self.typing
            .start_typing(connection, &payload.room, &payload.username)
            .await?;
        Ok(())
    }

    async fn on_stop_typing(&self, payload: StopTypingPayload) -> Result<(), ApplicationError> {
        self.typing.stop_typing(&payload.room).await?;
        Ok(())
    }

    async fn on_private_typing(
        &self,
        payload: PrivateTypingPayload,
    ) -> Result<(), ApplicationError> {
        self.typing
            .start_typing_direct(&payload.to_user, &payload.from_user)
            .await?;
        Ok(())
    }

    async fn on_private_stop_typing(
        &self,
        payload: PrivateStopTypingPayload,
    ) -> Result<(), ApplicationError> {
        self.typing.stop_typing_direct(&payload.to_user).await?;
        Ok(())
    }

    // 负载里的 from_user 不可信，实际发送者以注册表为准
    async fn check_claimed_sender(&self, connection: ConnectionId, claimed: Option<&str>) {
        let Some(claimed) = claimed else {
            return;
        };
        if let Some(bound) = self.registry.resolve(connection).await {
            if bound.as_str() != claimed {
                tracing::warn!(
                    connection_id = %connection,
                    bound = %bound,
                    claimed,
                    "消息声明的发送者与注册身份不一致，使用注册身份"
                );
            }
        }
    }
}
