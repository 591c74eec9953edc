use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageId, RoomName, Timestamp, Username};

/// 去掉首尾空白后为空的文本不会被发送。
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// 待写入的群聊消息，`id` 由持久化网关分配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroupMessage {
    pub room: RoomName,
    pub from_user: Username,
    pub text: String,
    pub sent_at: Timestamp,
}

/// 已持久化的群聊消息。写入后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub id: MessageId,
    pub room: RoomName,
    pub from_user: Username,
    #[serde(rename = "message")]
    pub text: String,
    pub sent_at: Timestamp,
}

impl GroupMessage {
    pub fn stored(id: MessageId, message: NewGroupMessage) -> Self {
        Self {
            id,
            room: message.room,
            from_user: message.from_user,
            text: message.text,
            sent_at: message.sent_at,
        }
    }
}

/// 待写入的私聊消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDirectMessage {
    pub from_user: Username,
    pub to_user: Username,
    pub text: String,
    pub sent_at: Timestamp,
}

/// 已持久化的私聊消息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub id: MessageId,
    pub from_user: Username,
    pub to_user: Username,
    #[serde(rename = "message")]
    pub text: String,
    pub sent_at: Timestamp,
}

impl DirectMessage {
    pub fn stored(id: MessageId, message: NewDirectMessage) -> Self {
        Self {
            id,
            from_user: message.from_user,
            to_user: message.to_user,
            text: message.text,
            sent_at: message.sent_at,
        }
    }
}
