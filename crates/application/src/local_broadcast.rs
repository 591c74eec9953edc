// 单进程内的连接中心：每个连接一个有界通道
use std::collections::HashMap;

use async_trait::async_trait;
use domain::{ConnectionId, ServerEvent};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    RwLock,
};

use crate::broadcaster::Broadcaster;

/// 每个连接出站队列的默认容量
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1000;

pub struct ConnectionHub {
    senders: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
    capacity: usize,
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_OUTBOUND_CAPACITY)
    }
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定每个连接出站队列的容量，最小为 1
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// 传输层建立连接时调用，返回该连接的出站事件流
    pub async fn attach(&self, connection: ConnectionId) -> mpsc::Receiver<ServerEvent> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.senders.write().await.insert(connection, sender);
        receiver
    }

    pub async fn detach(&self, connection: ConnectionId) -> bool {
        self.senders.write().await.remove(&connection).is_some()
    }

    pub async fn is_connected(&self, connection: ConnectionId) -> bool {
        self.senders.read().await.contains_key(&connection)
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

/// 扇出不等待慢连接：队列满时丢弃该连接的这条事件
#[async_trait]
impl Broadcaster for ConnectionHub {
    async fn send_to(&self, targets: &[ConnectionId], event: ServerEvent) -> usize {
        let senders = self.senders.read().await;
        let mut delivered = 0;
        for target in targets {
            let Some(sender) = senders.get(target) else {
                tracing::debug!(connection_id = %target, "连接已断开，丢弃出站事件");
                continue;
            };
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection_id = %target,
                        capacity = self.capacity,
                        "出站队列已满，丢弃事件"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(connection_id = %target, "连接已关闭，丢弃出站事件");
                }
            }
        }
        delivered
    }
}
