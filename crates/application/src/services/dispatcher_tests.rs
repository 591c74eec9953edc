//! 事件分发与打字提示测试

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use domain::{
    ClientEvent, DirectMessage, ErrorPayload, GroupMessage, NewDirectMessage, NewGroupMessage,
    PrivateStopTypingPayload, PrivateTypingPayload, RepositoryError, RoomMessagePayload,
    RoomName, ServerEvent, StopTypingPayload, TypingPayload, Username,
};
use tokio::sync::Notify;

use crate::{
    error::ApplicationError,
    repository::{memory::InMemoryMessageStore, MessageRepository},
    services::test_support::Harness,
};

fn typing(username: &str, room: &str) -> ClientEvent {
    ClientEvent::Typing(TypingPayload {
        username: username.into(),
        room: room.into(),
    })
}

#[tokio::test]
async fn typing_skips_every_connection_of_the_typer() {
    let (harness, _store) = Harness::in_memory();
    let mut alice = harness.member("alice", &["devops"]).await;
    let mut alice_other_tab = harness.member("alice", &["devops"]).await;
    let mut bob = harness.member("bob", &["devops"]).await;
    let mut carol = harness.member("carol", &["devops"]).await;
    let mut elsewhere = harness.member("dave", &["random"]).await;

    harness.send(&alice, typing("alice", "devops")).await;

    let shown = vec![ServerEvent::ShowTyping("alice is typing...".into())];
    assert_eq!(bob.drain(), shown);
    assert_eq!(carol.drain(), shown);
    assert!(alice.drain().is_empty());
    assert!(alice_other_tab.drain().is_empty());
    assert!(elsewhere.drain().is_empty());
}

#[tokio::test]
async fn stop_typing_reaches_the_whole_room() {
    let (harness, _store) = Harness::in_memory();
    let mut alice = harness.member("alice", &["devops"]).await;
    let mut bob = harness.member("bob", &["devops"]).await;

    harness
        .send(
            &alice,
            ClientEvent::StopTyping(StopTypingPayload {
                room: "devops".into(),
            }),
        )
        .await;

    assert_eq!(alice.drain(), vec![ServerEvent::HideTyping]);
    assert_eq!(bob.drain(), vec![ServerEvent::HideTyping]);
}

#[tokio::test]
async fn private_typing_goes_to_recipient_only() {
    let (harness, _store) = Harness::in_memory();
    let mut alice = harness.member("alice", &[]).await;
    let mut bob = harness.member("bob", &[]).await;
    let mut bob_phone = harness.member("bob", &[]).await;
    let mut carol = harness.member("carol", &[]).await;

    harness
        .send(
            &alice,
            ClientEvent::PrivateTyping(PrivateTypingPayload {
                from_user: "alice".into(),
                to_user: "bob".into(),
            }),
        )
        .await;
    harness
        .send(
            &alice,
            ClientEvent::PrivateStopTyping(PrivateStopTypingPayload {
                to_user: "bob".into(),
            }),
        )
        .await;

    let expected = vec![
        ServerEvent::ShowPrivateTyping("alice is typing...".into()),
        ServerEvent::HidePrivateTyping,
    ];
    assert_eq!(bob.drain(), expected);
    assert_eq!(bob_phone.drain(), expected);
    assert!(alice.drain().is_empty());
    assert!(carol.drain().is_empty());
}

#[tokio::test]
async fn unregistered_send_is_reported_to_sender_only() {
    let (harness, store) = Harness::in_memory();
    let mut anonymous = harness.client().await;
    harness
        .send(&anonymous, ClientEvent::JoinRoom("devops".into()))
        .await;
    let mut bob = harness.member("bob", &["devops"]).await;

    let err = harness
        .dispatcher
        .dispatch(
            anonymous.id,
            ClientEvent::RoomMessage(RoomMessagePayload {
                from_user: None,
                room: "devops".into(),
                message: "hi".into(),
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApplicationError::NotRegistered));
    match anonymous.drain().as_slice() {
        [ServerEvent::Error(ErrorPayload { code, .. })] => assert_eq!(code, "NOT_REGISTERED"),
        other => panic!("unexpected events: {other:?}"),
    }
    assert!(bob.drain().is_empty());
    assert_eq!(store.group_message_count().await, 0);
}

#[tokio::test]
async fn empty_identity_is_rejected() {
    let (harness, _store) = Harness::in_memory();
    let mut client = harness.client().await;

    let err = harness
        .dispatcher
        .dispatch(client.id, ClientEvent::RegisterUser("".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, ApplicationError::InvalidIdentity(_)));
    assert_eq!(harness.registry.resolve(client.id).await, None);
    assert!(matches!(
        client.drain().as_slice(),
        [ServerEvent::Error(ErrorPayload { code, .. })] if code == "INVALID_IDENTITY"
    ));
}

#[tokio::test]
async fn blank_room_name_is_rejected() {
    let (harness, _store) = Harness::in_memory();
    let client = harness.member("alice", &[]).await;

    let err = harness
        .dispatcher
        .dispatch(client.id, ClientEvent::JoinRoom("  ".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, ApplicationError::InvalidRoom(_)));
    assert_eq!(harness.membership.room_count().await, 0);
}

#[tokio::test]
async fn reregister_changes_sender_identity() {
    let (harness, _store) = Harness::in_memory();
    let client = harness.member("alice", &["devops"]).await;
    harness
        .send(&client, ClientEvent::RegisterUser("alice2".into()))
        .await;

    let stored = harness
        .dispatcher
        .router()
        .send_group(client.id, "devops", "renamed".into())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stored.from_user, Username::parse("alice2").unwrap());
    assert!(harness
        .registry
        .connections_for(&Username::parse("alice").unwrap())
        .await
        .is_empty());
}

#[tokio::test]
async fn events_after_disconnect_are_dropped() {
    let (harness, _store) = Harness::in_memory();
    let client = harness.member("alice", &["devops"]).await;

    harness.dispatcher.disconnect(client.id).await;
    assert!(!harness.hub.is_connected(client.id).await);

    harness
        .dispatcher
        .dispatch(client.id, ClientEvent::JoinRoom("devops".into()))
        .await
        .unwrap();

    let devops = RoomName::parse("devops").unwrap();
    assert!(harness.membership.members_of(&devops).await.is_empty());
    assert_eq!(harness.registry.resolve(client.id).await, None);
}

/// 群聊写入在 `release` 之前一直挂起
#[derive(Default)]
struct GatedStore {
    inner: InMemoryMessageStore,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl MessageRepository for GatedStore {
    async fn append_group(&self, message: NewGroupMessage) -> Result<GroupMessage, RepositoryError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.append_group(message).await
    }

    async fn append_direct(
        &self,
        message: NewDirectMessage,
    ) -> Result<DirectMessage, RepositoryError> {
        self.inner.append_direct(message).await
    }

    async fn fetch_group_history(
        &self,
        room: &RoomName,
        limit: u32,
    ) -> Result<Vec<GroupMessage>, RepositoryError> {
        self.inner.fetch_group_history(room, limit).await
    }
}

#[tokio::test]
async fn disconnect_waits_for_in_flight_event() {
    let store = Arc::new(GatedStore::default());
    let harness = Arc::new(Harness::with_store(store.clone()));
    let mut alice = harness.member("alice", &["devops"]).await;
    let alice_id = alice.id;

    let sending = {
        let harness = harness.clone();
        tokio::spawn(async move {
            harness
                .dispatcher
                .dispatch(
                    alice_id,
                    ClientEvent::RoomMessage(RoomMessagePayload {
                        from_user: None,
                        room: "devops".into(),
                        message: "last words".into(),
                    }),
                )
                .await
        })
    };
    store.entered.notified().await;

    let disconnecting = {
        let harness = harness.clone();
        tokio::spawn(async move { harness.dispatcher.disconnect(alice_id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!disconnecting.is_finished());
    assert!(harness.hub.is_connected(alice_id).await);

    store.release.notify_one();
    sending.await.unwrap().unwrap();
    disconnecting.await.unwrap();

    // 事件在断开之前完整处理，断开之后不留任何状态
    assert!(matches!(
        alice.drain().as_slice(),
        [ServerEvent::ReceiveRoomMessage(message)] if message.text == "last words"
    ));
    let devops = RoomName::parse("devops").unwrap();
    assert!(harness.membership.members_of(&devops).await.is_empty());
    assert_eq!(harness.registry.resolve(alice_id).await, None);
    assert!(!harness.hub.is_connected(alice_id).await);
}
