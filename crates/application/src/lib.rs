//! 应用层实现。
//!
//! 实时路由与在线状态层：连接到身份的映射、房间成员索引、
//! 群聊/私聊消息扇出、打字提示，以及对持久化网关的抽象。

pub mod broadcaster;
pub mod clock;
pub mod error;
mod keyed_lock;
pub mod local_broadcast;
pub mod membership;
pub mod registry;
pub mod repository;
pub mod services;

pub use broadcaster::Broadcaster;
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use local_broadcast::ConnectionHub;
pub use membership::RoomMembership;
pub use registry::ConnectionRegistry;
pub use repository::{memory::InMemoryMessageStore, MessageRepository};
pub use services::{
    Dispatcher, DispatcherDependencies, HistoryService, MessageRouter, MessageRouterDependencies,
    TypingCoordinator,
};
