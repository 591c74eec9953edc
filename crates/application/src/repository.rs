use async_trait::async_trait;
use domain::{
    DirectMessage, GroupMessage, NewDirectMessage, NewGroupMessage, RepositoryError, RoomName,
};

/// 持久化网关：只追加的消息存储。
///
/// `id` 在写入时由实现方分配，之后不可变。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    // 写入群聊消息，返回带 id 的存储副本
    async fn append_group(&self, message: NewGroupMessage) -> Result<GroupMessage, RepositoryError>;

    // 写入私聊消息
    async fn append_direct(
        &self,
        message: NewDirectMessage,
    ) -> Result<DirectMessage, RepositoryError>;

    // 房间最近 `limit` 条消息，按发送时间从旧到新
    async fn fetch_group_history(
        &self,
        room: &RoomName,
        limit: u32,
    ) -> Result<Vec<GroupMessage>, RepositoryError>;
}

/// 内存实现的消息存储（用于开发和测试）
pub mod memory {
    use super::*;
    use domain::MessageId;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryMessageStore {
        group: RwLock<Vec<GroupMessage>>,
        direct: RwLock<Vec<DirectMessage>>,
    }

    impl InMemoryMessageStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// 已写入的私聊消息快照
        #[cfg(test)]
        pub(crate) async fn direct_messages(&self) -> Vec<DirectMessage> {
            self.direct.read().await.clone()
        }

        #[cfg(test)]
        pub(crate) async fn group_message_count(&self) -> usize {
            self.group.read().await.len()
        }
    }

    fn next_id() -> MessageId {
        MessageId::new(uuid::Uuid::new_v4())
    }

    #[async_trait]
    impl MessageRepository for InMemoryMessageStore {
        async fn append_group(
            &self,
            message: NewGroupMessage,
        ) -> Result<GroupMessage, RepositoryError> {
            let stored = GroupMessage::stored(next_id(), message);
            self.group.write().await.push(stored.clone());
            Ok(stored)
        }

        async fn append_direct(
            &self,
            message: NewDirectMessage,
        ) -> Result<DirectMessage, RepositoryError> {
            let stored = DirectMessage::stored(next_id(), message);
            self.direct.write().await.push(stored.clone());
            Ok(stored)
        }

        async fn fetch_group_history(
            &self,
            room: &RoomName,
            limit: u32,
        ) -> Result<Vec<GroupMessage>, RepositoryError> {
            let group = self.group.read().await;
            let mut messages: Vec<GroupMessage> = group
                .iter()
                .filter(|message| &message.room == room)
                .cloned()
                .collect();
            // 稳定排序，同一时间戳保持写入顺序
            messages.sort_by_key(|message| message.sent_at);
            let skip = messages.len().saturating_sub(limit as usize);
            Ok(messages.split_off(skip))
        }
    }
}
