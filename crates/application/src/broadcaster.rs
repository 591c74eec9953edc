use async_trait::async_trait;
use domain::{ConnectionId, ServerEvent};

/// 出站事件投递
///
/// 扇出只在本地进行且不阻塞。已经断开或出站队列已满的连接收不到该事件，不算错误。
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// 把同一个事件投递给一组连接，返回实际送达的连接数
    async fn send_to(&self, targets: &[ConnectionId], event: ServerEvent) -> usize;
}
