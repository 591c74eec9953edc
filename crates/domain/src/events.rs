//! WebSocket 上收发的事件
//!
//! 帧格式为 `{"event": <名称>, "data": <负载>}`，事件名沿用客户端已有的约定。

use serde::{Deserialize, Serialize};

use crate::message::{DirectMessage, GroupMessage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessagePayload {
    #[serde(default)]
    pub from_user: Option<String>,
    pub room: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessagePayload {
    #[serde(default)]
    pub from_user: Option<String>,
    pub to_user: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub username: String,
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTypingPayload {
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateTypingPayload {
    pub from_user: String,
    pub to_user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateStopTypingPayload {
    pub to_user: String,
}

/// 客户端发来的事件。断开连接由传输层关闭表达，不在此列。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    RegisterUser(String),
    JoinRoom(String),
    LeaveRoom(String),
    RoomMessage(RoomMessagePayload),
    PrivateMessage(PrivateMessagePayload),
    Typing(TypingPayload),
    StopTyping(StopTypingPayload),
    PrivateTyping(PrivateTypingPayload),
    PrivateStopTyping(PrivateStopTypingPayload),
}

impl ClientEvent {
    /// 事件名，用于日志。
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::RegisterUser(_) => "register_user",
            ClientEvent::JoinRoom(_) => "join_room",
            ClientEvent::LeaveRoom(_) => "leave_room",
            ClientEvent::RoomMessage(_) => "room_message",
            ClientEvent::PrivateMessage(_) => "private_message",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::StopTyping(_) => "stop_typing",
            ClientEvent::PrivateTyping(_) => "private_typing",
            ClientEvent::PrivateStopTyping(_) => "private_stop_typing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// 服务端推送给连接的事件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveRoomMessage(GroupMessage),
    ReceivePrivateMessage(DirectMessage),
    ShowTyping(String),
    HideTyping,
    ShowPrivateTyping(String),
    HidePrivateTyping,
    Error(ErrorPayload),
}

impl ServerEvent {
    /// 打字提示文本
    pub fn typing_text(username: &str) -> String {
        format!("{username} is typing...")
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            code: code.into(),
            message: message.into(),
        })
    }
}
