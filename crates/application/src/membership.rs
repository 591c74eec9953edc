use std::collections::{HashMap, HashSet};

use domain::{ConnectionId, RoomName};
use tokio::sync::RwLock;

/// 房间成员管理
///
/// 房间只作为成员索引中的键存在：第一次加入时出现，最后一个成员离开时消失。
/// 房间到连接、连接到房间两个方向的索引在同一把锁下维护，保证对称。
#[derive(Default)]
pub struct RoomMembership {
    inner: RwLock<MembershipState>,
}

#[derive(Default)]
struct MembershipState {
    rooms: HashMap<RoomName, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<RoomName>>,
}

impl MembershipState {
    fn remove(&mut self, connection: ConnectionId, room: &RoomName) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(members) => {
                let removed = members.remove(&connection);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
                removed
            }
            None => false,
        };

        if let Some(rooms) = self.joined.get_mut(&connection) {
            rooms.remove(room);
            if rooms.is_empty() {
                self.joined.remove(&connection);
            }
        }

        removed
    }
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入房间，已是成员时无操作。返回是否新加入。
    pub async fn join(&self, connection: ConnectionId, room: &RoomName) -> bool {
        let mut state = self.inner.write().await;
        let inserted = state
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection);
        state
            .joined
            .entry(connection)
            .or_default()
            .insert(room.clone());
        inserted
    }

    /// 离开房间，不是成员时无操作。返回是否确实离开。
    pub async fn leave(&self, connection: ConnectionId, room: &RoomName) -> bool {
        self.inner.write().await.remove(connection, room)
    }

    /// 房间当前成员快照。未知房间返回空集合。
    pub async fn members_of(&self, room: &RoomName) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) async fn rooms_of(&self, connection: ConnectionId) -> Vec<RoomName> {
        self.inner
            .read()
            .await
            .joined
            .get(&connection)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 从所有已加入的房间移除连接
    ///
    /// 整个过程持有写锁，完成后任何 `members_of` 快照都不会再包含该连接。
    pub async fn leave_all(&self, connection: ConnectionId) -> Vec<RoomName> {
        let mut state = self.inner.write().await;
        let rooms: Vec<RoomName> = state
            .joined
            .remove(&connection)
            .map(|rooms| rooms.into_iter().collect())
            .unwrap_or_default();

        for room in &rooms {
            if let Some(members) = state.rooms.get_mut(room) {
                members.remove(&connection);
                if members.is_empty() {
                    state.rooms.remove(room);
                }
            }
        }

        rooms
    }

    /// 当前有成员的房间数
    #[cfg(test)]
    pub(crate) async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }
}
