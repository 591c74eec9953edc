use std::collections::{HashMap, HashSet};

use domain::{ConnectionId, Username};
use tokio::sync::RwLock;

use crate::error::ApplicationError;

/// 连接注册表：连接到身份的绑定，以及身份到连接集合的反向索引。
///
/// 同一身份可以同时绑定多个连接（多个标签页）。注册表不去重，
/// 任何连接都可以声明任意身份，身份的真实性由身份服务在注册前保证。
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    bindings: HashMap<ConnectionId, Username>,
    by_identity: HashMap<Username, HashSet<ConnectionId>>,
}

impl RegistryState {
    fn release(&mut self, connection: ConnectionId) -> Option<Username> {
        let previous = self.bindings.remove(&connection)?;
        if let Some(connections) = self.by_identity.get_mut(&previous) {
            connections.remove(&connection);
            if connections.is_empty() {
                self.by_identity.remove(&previous);
            }
        }
        Some(previous)
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定身份，替换该连接之前的绑定
    pub async fn register(
        &self,
        connection: ConnectionId,
        identity: impl Into<String>,
    ) -> Result<Username, ApplicationError> {
        let username = Username::parse(identity).map_err(ApplicationError::InvalidIdentity)?;

        let mut state = self.inner.write().await;
        if let Some(previous) = state.release(connection) {
            tracing::debug!(
                connection_id = %connection,
                previous = %previous,
                "连接重新注册，替换旧身份"
            );
        }
        state.bindings.insert(connection, username.clone());
        state
            .by_identity
            .entry(username.clone())
            .or_default()
            .insert(connection);

        Ok(username)
    }

    pub async fn resolve(&self, connection: ConnectionId) -> Option<Username> {
        self.inner.read().await.bindings.get(&connection).cloned()
    }

    /// 身份当前绑定的全部连接，可能为空
    pub async fn connections_for(&self, identity: &Username) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .by_identity
            .get(identity)
            .map(|connections| connections.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn unregister(&self, connection: ConnectionId) -> Option<Username> {
        self.inner.write().await.release(connection)
    }
}
