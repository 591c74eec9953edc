use std::sync::Arc;

use domain::{GroupMessage, RoomName};

use crate::{error::ApplicationError, repository::MessageRepository};

/// 群聊历史查询
pub struct HistoryService {
    repository: Arc<dyn MessageRepository>,
    default_limit: u32,
    max_limit: u32,
}

impl HistoryService {
    pub fn new(repository: Arc<dyn MessageRepository>, default_limit: u32, max_limit: u32) -> Self {
        Self {
            repository,
            default_limit,
            max_limit: max_limit.max(1),
        }
    }

    /// 房间最近的消息，从旧到新。`limit` 缺省时用默认值，超过上限时截断。
    pub async fn group_history(
        &self,
        room: &str,
        limit: Option<u32>,
    ) -> Result<Vec<GroupMessage>, ApplicationError> {
        let room = RoomName::parse(room).map_err(ApplicationError::InvalidRoom)?;
        let limit = limit
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit);

        let messages = self
            .repository
            .fetch_group_history(&room, limit)
            .await
            .map_err(|err| {
                tracing::error!(room = %room, error = %err, "读取群聊历史失败");
                ApplicationError::from(err)
            })?;

        Ok(messages)
    }
}
