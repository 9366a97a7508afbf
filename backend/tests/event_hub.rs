use serde_json::json;
use ticketing_backend::{
    hub::{
        message::{RECEIVE_UPDATE, USER_JOINED},
        EventHub, EventNotice, HubError, NoticeKind, ServerFrame,
    },
    models::user::{User, UserRole},
    utils::jwt::TokenIssuer,
};
use tokio::sync::mpsc::error::TryRecvError;

fn claims() -> ticketing_backend::utils::jwt::Claims {
    let user = User::new(
        "a@x.com".into(),
        "hash".into(),
        "Ann".into(),
        UserRole::Attendee,
        true,
    );
    TokenIssuer::new(Some("s".into()), "iss", "aud", chrono::Duration::minutes(5)).claims_for(&user)
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<ServerFrame>) -> Vec<ServerFrame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

fn update(notice: &EventNotice) -> ServerFrame {
    ServerFrame::event(RECEIVE_UPDATE, serde_json::to_value(notice).unwrap())
}

#[tokio::test]
async fn publish_reaches_only_the_target_group() {
    let hub = EventHub::new();
    let (in_42, mut rx_42) = hub.connect(&claims()).await;
    let (in_7, mut rx_7) = hub.connect(&claims()).await;
    hub.join_group(in_42, "42").await.unwrap();
    hub.join_group(in_7, "7").await.unwrap();
    drain(&mut rx_42);
    drain(&mut rx_7);

    let notice = EventNotice::text("42", "doors open at 7");
    assert_eq!(hub.notify(notice.clone()).await, 1);

    assert_eq!(drain(&mut rx_42), vec![update(&notice)]);
    assert!(matches!(rx_7.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn leaving_stops_delivery() {
    let hub = EventHub::new();
    let (conn, mut rx) = hub.connect(&claims()).await;
    hub.join_group(conn, "42").await.unwrap();
    drain(&mut rx);

    hub.leave_group(conn, "42").await;
    assert_eq!(hub.group_size("42").await, 0);
    assert_eq!(hub.notify(EventNotice::text("42", "hello")).await, 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn disconnect_removes_every_membership() {
    let hub = EventHub::new();
    let (conn, _rx) = hub.connect(&claims()).await;
    let (other, _other_rx) = hub.connect(&claims()).await;
    hub.join_group(conn, "1").await.unwrap();
    hub.join_group(conn, "2").await.unwrap();
    hub.join_group(other, "2").await.unwrap();

    hub.on_disconnect(conn).await;
    assert_eq!(hub.group_size("1").await, 0);
    assert_eq!(hub.group_size("2").await, 1);
    assert_eq!(hub.connection_count().await, 1);

    // Identities do not survive a reconnect; a fresh connection starts with no groups.
    let (fresh, mut fresh_rx) = hub.connect(&claims()).await;
    assert_ne!(fresh, conn);
    hub.notify(EventNotice::text("1", "anyone?")).await;
    assert!(drain(&mut fresh_rx).is_empty());
    assert_eq!(
        hub.join_group(conn, "1").await,
        Err(HubError::UnknownConnection)
    );
}

#[tokio::test]
async fn frames_from_one_publisher_keep_their_order() {
    let hub = EventHub::new();
    let (conn, mut rx) = hub.connect(&claims()).await;
    hub.join_group(conn, "42").await.unwrap();
    drain(&mut rx);

    for i in 0..20 {
        hub.notify(EventNotice::text("42", format!("msg {}", i))).await;
    }
    let received: Vec<_> = drain(&mut rx);
    let expected: Vec<_> = (0..20)
        .map(|i| update(&EventNotice::text("42", format!("msg {}", i))))
        .collect();
    assert_eq!(received, expected);
}

#[tokio::test]
async fn joiner_and_existing_members_see_user_joined() {
    let hub = EventHub::new();
    let (first, mut first_rx) = hub.connect(&claims()).await;
    hub.join_group(first, "42").await.unwrap();
    let (second, mut second_rx) = hub.connect(&claims()).await;
    hub.join_group(second, "42").await.unwrap();

    let joined = |id: String| ServerFrame::event(USER_JOINED, json!(id));
    assert_eq!(
        drain(&mut first_rx),
        vec![joined(first.to_string()), joined(second.to_string())]
    );
    assert_eq!(drain(&mut second_rx), vec![joined(second.to_string())]);
}

#[tokio::test]
async fn notices_carry_their_kind() {
    let hub = EventHub::new();
    let (conn, mut rx) = hub.connect(&claims()).await;
    hub.join_group(conn, "42").await.unwrap();
    drain(&mut rx);

    hub.notify(EventNotice {
        kind: NoticeKind::AttachmentUploaded,
        event_id: "42".into(),
        data: json!({"fileName": "poster.png"}),
    })
    .await;

    match drain(&mut rx).pop() {
        Some(ServerFrame::Event { target, arguments }) => {
            assert_eq!(target, RECEIVE_UPDATE);
            assert_eq!(arguments[0]["kind"], "AttachmentUploaded");
            assert_eq!(arguments[0]["data"]["fileName"], "poster.png");
        }
        other => panic!("unexpected frame {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_joins_are_all_recorded() {
    let hub = std::sync::Arc::new(EventHub::new());
    let mut handles = Vec::new();
    for _ in 0..32 {
        let hub = hub.clone();
        handles.push(tokio::spawn(async move {
            let (conn, rx) = hub.connect(&claims()).await;
            hub.join_group(conn, "42").await.unwrap();
            rx
        }));
    }
    let mut receivers = Vec::new();
    for handle in handles {
        receivers.push(handle.await.unwrap());
    }
    assert_eq!(hub.group_size("42").await, 32);
    assert_eq!(hub.notify(EventNotice::text("42", "all")).await, 32);
}
