use std::{collections::HashSet, sync::Arc};

use domain::{ConnectionId, RoomName, ServerEvent, Username};

use crate::{
    broadcaster::Broadcaster, error::ApplicationError, membership::RoomMembership,
    registry::ConnectionRegistry,
};

/// 打字提示协调器
///
/// 纯内存，不持久化，也不持有服务端定时器：清除过期提示是调用方的责任，
/// 客户端在最后一次按键后空闲一段时间或发出消息时发送 stop。
/// 从不发送 stop 的调用方会让接收方的提示一直显示。
pub struct TypingCoordinator {
    registry: Arc<ConnectionRegistry>,
    membership: Arc<RoomMembership>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl TypingCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        membership: Arc<RoomMembership>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            registry,
            membership,
            broadcaster,
        }
    }

    /// 向房间内除打字者之外的连接广播“正在输入”
    ///
    /// 排除发起事件的连接以及打字者身份绑定的所有连接。
    pub async fn start_typing(
        &self,
        origin: ConnectionId,
        room: &str,
        username: &str,
    ) -> Result<usize, ApplicationError> {
        let room = RoomName::parse(room).map_err(ApplicationError::InvalidRoom)?;
        let username = Username::parse(username).map_err(ApplicationError::InvalidIdentity)?;

        let mut excluded: HashSet<ConnectionId> =
            self.registry.connections_for(&username).await.into_iter().collect();
        excluded.insert(origin);

        let targets: Vec<ConnectionId> = self
            .membership
            .members_of(&room)
            .await
            .into_iter()
            .filter(|connection| !excluded.contains(connection))
            .collect();

        let delivered = self
            .broadcaster
            .send_to(
                &targets,
                ServerEvent::ShowTyping(ServerEvent::typing_text(username.as_str())),
            )
            .await;
        tracing::debug!(room = %room, username = %username, delivered, "show_typing");
        Ok(delivered)
    }

    /// 向整个房间广播清除信号
    pub async fn stop_typing(&self, room: &str) -> Result<usize, ApplicationError> {
        let room = RoomName::parse(room).map_err(ApplicationError::InvalidRoom)?;
        let members = self.membership.members_of(&room).await;
        let delivered = self.broadcaster.send_to(&members, ServerEvent::HideTyping).await;
        tracing::debug!(room = %room, delivered, "hide_typing");
        Ok(delivered)
    }

    /// 只投递给 `to_user` 绑定的连接
    pub async fn start_typing_direct(
        &self,
        to_user: &str,
        from_user: &str,
    ) -> Result<usize, ApplicationError> {
        let to_user = Username::parse(to_user).map_err(ApplicationError::InvalidIdentity)?;
        let from_user = Username::parse(from_user).map_err(ApplicationError::InvalidIdentity)?;

        let targets = self.registry.connections_for(&to_user).await;
        let delivered = self
            .broadcaster
            .send_to(
                &targets,
                ServerEvent::ShowPrivateTyping(ServerEvent::typing_text(from_user.as_str())),
            )
            .await;
        tracing::debug!(to_user = %to_user, from_user = %from_user, delivered, "show_private_typing");
        Ok(delivered)
    }

    pub async fn stop_typing_direct(&self, to_user: &str) -> Result<usize, ApplicationError> {
        let to_user = Username::parse(to_user).map_err(ApplicationError::InvalidIdentity)?;
        let targets = self.registry.connections_for(&to_user).await;
        let delivered = self
            .broadcaster
            .send_to(&targets, ServerEvent::HidePrivateTyping)
            .await;
        tracing::debug!(to_user = %to_user, delivered, "hide_private_typing");
        Ok(delivered)
    }
}
