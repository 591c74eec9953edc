use std::{collections::HashSet, sync::Arc};

use domain::{
    is_blank, ConnectionId, ConversationKey, DirectMessage, GroupMessage, NewDirectMessage,
    NewGroupMessage, RoomName, ServerEvent, Username,
};

use crate::{
    broadcaster::Broadcaster, clock::Clock, error::ApplicationError, keyed_lock::KeyedLocks,
    membership::RoomMembership, registry::ConnectionRegistry, repository::MessageRepository,
};

pub struct MessageRouterDependencies {
    pub registry: Arc<ConnectionRegistry>,
    pub membership: Arc<RoomMembership>,
    pub repository: Arc<dyn MessageRepository>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub clock: Arc<dyn Clock>,
}

/// 消息路由：校验、持久化，然后扇出给在线连接。
///
/// 同一房间的写入与广播在房间锁内顺序完成，所以房间成员看到的顺序与写入顺序一致；
/// 不同房间之间互不阻塞。私聊按用户对做同样的串行化。
pub struct MessageRouter {
    deps: MessageRouterDependencies,
    room_locks: KeyedLocks<RoomName>,
    conversation_locks: KeyedLocks<ConversationKey>,
}

impl MessageRouter {
    pub fn new(deps: MessageRouterDependencies) -> Self {
        Self {
            deps,
            room_locks: KeyedLocks::default(),
            conversation_locks: KeyedLocks::default(),
        }
    }

    async fn sender_identity(&self, connection: ConnectionId) -> Result<Username, ApplicationError> {
        self.deps
            .registry
            .resolve(connection)
            .await
            .ok_or(ApplicationError::NotRegistered)
    }

    /// 发送群聊消息
    ///
    /// 空白文本返回 `Ok(None)`，不写入也不广播。广播对象包括发送者自己的连接，
    /// 发送者看到的是带服务端 id 和时间的存储副本。
    pub async fn send_group(
        &self,
        connection: ConnectionId,
        room: &str,
        text: String,
    ) -> Result<Option<GroupMessage>, ApplicationError> {
        if is_blank(&text) {
            tracing::debug!(connection_id = %connection, room, "忽略空白群聊消息");
            return Ok(None);
        }
        let room = RoomName::parse(room).map_err(ApplicationError::InvalidRoom)?;
        let from_user = self.sender_identity(connection).await?;

        let _guard = self.room_locks.lock(&room).await;

        let stored = self
            .deps
            .repository
            .append_group(NewGroupMessage {
                room: room.clone(),
                from_user,
                text,
                sent_at: self.deps.clock.now(),
            })
            .await
            .map_err(|err| {
                tracing::error!(room = %room, error = %err, "群聊消息写入失败，取消广播");
                ApplicationError::from(err)
            })?;

        let members = self.deps.membership.members_of(&room).await;
        let delivered = self
            .deps
            .broadcaster
            .send_to(&members, ServerEvent::ReceiveRoomMessage(stored.clone()))
            .await;

        tracing::debug!(
            room = %room,
            message_id = %stored.id,
            members = members.len(),
            delivered,
            "群聊消息已广播"
        );

        Ok(Some(stored))
    }

    /// 发送私聊消息
    ///
    /// 投递目标是身份而不是连接：接收者和发送者绑定的所有连接都会收到。
    /// 接收者不在线时只持久化，不做实时投递。
    pub async fn send_direct(
        &self,
        connection: ConnectionId,
        to_user: &str,
        text: String,
    ) -> Result<Option<DirectMessage>, ApplicationError> {
        if is_blank(&text) {
            tracing::debug!(connection_id = %connection, to_user, "忽略空白私聊消息");
            return Ok(None);
        }
        let to_user = Username::parse(to_user).map_err(ApplicationError::InvalidIdentity)?;
        let from_user = self.sender_identity(connection).await?;

        let _guard = self
            .conversation_locks
            .lock(&ConversationKey::new(&from_user, &to_user))
            .await;

        let stored = self
            .deps
            .repository
            .append_direct(NewDirectMessage {
                from_user: from_user.clone(),
                to_user: to_user.clone(),
                text,
                sent_at: self.deps.clock.now(),
            })
            .await
            .map_err(|err| {
                tracing::error!(
                    from_user = %from_user,
                    to_user = %to_user,
                    error = %err,
                    "私聊消息写入失败，取消投递"
                );
                ApplicationError::from(err)
            })?;

        let mut targets: HashSet<ConnectionId> = self
            .deps
            .registry
            .connections_for(&to_user)
            .await
            .into_iter()
            .collect();
        targets.extend(self.deps.registry.connections_for(&from_user).await);
        let targets: Vec<ConnectionId> = targets.into_iter().collect();

        let delivered = self
            .deps
            .broadcaster
            .send_to(&targets, ServerEvent::ReceivePrivateMessage(stored.clone()))
            .await;

        tracing::debug!(
            from_user = %from_user,
            to_user = %to_user,
            message_id = %stored.id,
            delivered,
            "私聊消息已投递"
        );

        Ok(Some(stored))
    }

    #[cfg(test)]
    pub(crate) fn held_room_locks(&self) -> usize {
        self.room_locks.len()
    }
}
