//! 实时聊天路由核心的领域模型
//!
//! 包含连接、身份、房间名等值对象，已持久化的群聊/私聊消息，
//! 以及 WebSocket 上收发的事件定义。

pub mod errors;
pub mod events;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use events::*;
pub use message::*;
pub use value_objects::*;
