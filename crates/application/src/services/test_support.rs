//! 服务测试共用的装配代码

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use chrono::{Duration, TimeZone, Utc};
use domain::{ClientEvent, ConnectionId, ServerEvent, Timestamp};
use tokio::sync::mpsc;

use crate::{
    clock::Clock,
    local_broadcast::ConnectionHub,
    membership::RoomMembership,
    registry::ConnectionRegistry,
    repository::{memory::InMemoryMessageStore, MessageRepository},
    services::dispatcher::{Dispatcher, DispatcherDependencies},
};

/// 每次调用前进一秒的时钟
#[derive(Default)]
pub(crate) struct SteppingClock {
    ticks: AtomicI64,
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(tick)
    }
}

pub(crate) struct Harness {
    pub dispatcher: Dispatcher,
    pub registry: Arc<ConnectionRegistry>,
    pub membership: Arc<RoomMembership>,
    pub hub: Arc<ConnectionHub>,
}

pub(crate) struct TestClient {
    pub id: ConnectionId,
    pub events: mpsc::Receiver<ServerEvent>,
}

impl TestClient {
    /// 取出当前已收到的全部事件
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Harness {
    pub fn with_store(repository: Arc<dyn MessageRepository>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let membership = Arc::new(RoomMembership::new());
        let hub = Arc::new(ConnectionHub::new());
        let dispatcher = Dispatcher::new(DispatcherDependencies {
            registry: registry.clone(),
            membership: membership.clone(),
            hub: hub.clone(),
            repository,
            clock: Arc::new(SteppingClock::default()),
        });
        Self {
            dispatcher,
            registry,
            membership,
            hub,
        }
    }

    pub fn in_memory() -> (Self, Arc<InMemoryMessageStore>) {
        let store = Arc::new(InMemoryMessageStore::new());
        (Self::with_store(store.clone()), store)
    }

    pub async fn client(&self) -> TestClient {
        let (id, events) = self.dispatcher.connect().await;
        TestClient { id, events }
    }

    /// 建立连接、注册身份并加入给定房间
    pub async fn member(&self, username: &str, rooms: &[&str]) -> TestClient {
        let client = self.client().await;
        self.send(&client, ClientEvent::RegisterUser(username.into()))
            .await;
        for room in rooms {
            self.send(&client, ClientEvent::JoinRoom((*room).into())).await;
        }
        client
    }

    pub async fn send(&self, client: &TestClient, event: ClientEvent) {
        self.dispatcher
            .dispatch(client.id, event)
            .await
            .expect("dispatch");
    }
}
