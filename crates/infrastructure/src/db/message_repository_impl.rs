//! 消息Repository实现

use application::MessageRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    DirectMessage, GroupMessage, MessageId, NewDirectMessage, NewGroupMessage, RepositoryError,
    RoomName, Username,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// 数据库群聊消息模型
#[derive(Debug, Clone, FromRow)]
struct DbGroupMessage {
    id: Uuid,
    room: String,
    from_user: String,
    message: String,
    sent_at: DateTime<Utc>,
}

impl TryFrom<DbGroupMessage> for GroupMessage {
    type Error = RepositoryError;

    fn try_from(row: DbGroupMessage) -> Result<Self, Self::Error> {
        Ok(GroupMessage {
            id: MessageId::new(row.id),
            room: RoomName::parse(row.room).map_err(corrupt_row)?,
            from_user: Username::parse(row.from_user).map_err(corrupt_row)?,
            text: row.message,
            sent_at: row.sent_at,
        })
    }
}

fn corrupt_row(err: domain::DomainError) -> RepositoryError {
    RepositoryError::rejected(format!("corrupt row: {err}"))
}

fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db) => RepositoryError::rejected(db.to_string()),
        other => RepositoryError::unavailable(other.to_string()),
    }
}

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append_group(&self, message: NewGroupMessage) -> Result<GroupMessage, RepositoryError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO group_messages (id, room, from_user, message, sent_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id)
        .bind(message.room.as_str())
        .bind(message.from_user.as_str())
        .bind(&message.text)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(GroupMessage::stored(MessageId::new(id), message))
    }

    async fn append_direct(
        &self,
        message: NewDirectMessage,
    ) -> Result<DirectMessage, RepositoryError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO direct_messages (id, from_user, to_user, message, sent_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id)
        .bind(message.from_user.as_str())
        .bind(message.to_user.as_str())
        .bind(&message.text)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(DirectMessage::stored(MessageId::new(id), message))
    }

    async fn fetch_group_history(
        &self,
        room: &RoomName,
        limit: u32,
    ) -> Result<Vec<GroupMessage>, RepositoryError> {
        // 先按时间倒序取最近的 limit 条，再翻转成从旧到新
        let rows = sqlx::query_as::<_, DbGroupMessage>(
            r#"SELECT id, room, from_user, message, sent_at FROM (
                   SELECT seq, id, room, from_user, message, sent_at
                   FROM group_messages
                   WHERE room = $1
                   ORDER BY sent_at DESC, seq DESC
                   LIMIT $2
               ) recent
               ORDER BY sent_at ASC, seq ASC"#,
        )
        .bind(room.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(GroupMessage::try_from).collect()
    }
}
