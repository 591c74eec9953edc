use domain::{DomainError, RepositoryError};
use thiserror::Error;

/// 应用层错误。所有错误只影响触发它的连接，不会终止路由进程。
///
/// 空白消息不是错误：发送接口返回 `Ok(None)` 并静默丢弃。
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("connection has not registered an identity")]
    NotRegistered,
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[source] DomainError),
    #[error("invalid room: {0}")]
    InvalidRoom(#[source] DomainError),
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] RepositoryError),
}

impl ApplicationError {
    /// 推送给客户端的错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::NotRegistered => "NOT_REGISTERED",
            ApplicationError::InvalidIdentity(_) => "INVALID_IDENTITY",
            ApplicationError::InvalidRoom(_) => "INVALID_ROOM",
            ApplicationError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }
}
