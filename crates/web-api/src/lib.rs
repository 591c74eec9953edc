//! Web API 层。
//!
//! 提供 Axum 路由：群聊历史查询，以及把 WebSocket 帧交给事件分发器的传输层。

mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
