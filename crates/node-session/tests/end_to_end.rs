//! Full device ↔ node exchange against the in-process fake node: user
//! `u1` on device `dev1` authenticates, receives session token `tok1`, and
//! sends signed requests the node accepts.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use sn_domain::Error;
use sn_protocol::{SpaceUser, HEADER_AUTH_KEY, HEADER_AUTH_TOKEN};
use sn_session::session::now_ms;
use sn_session::testing::{self, Behavior, FakeNode};
use sn_session::{NodeRequest, NodeSession};

fn session(fake: &Arc<FakeNode>) -> Arc<NodeSession> {
    Arc::new(
        NodeSession::new(
            Arc::new(fake.node_ref("home", Some("S1"))),
            testing::device_identity(),
            fake.clone(),
            testing::fast_options(),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn u1_dev1_receives_tok1_and_signs_requests() {
    let fake = FakeNode::new();
    let expires = now_ms() + 10 * 60 * 1000;
    fake.set_session_token("tok1");
    fake.set_behavior(Behavior::ExpiresAt(expires));
    fake.route(
        Method::GET,
        "/users",
        200,
        &serde_json::json!([{ "userID": "u1", "name": "norm", "isOwner": true }]),
    );

    let session = session(&fake);
    assert!(session.authenticate().await.unwrap());
    assert!(session.is_authenticated());
    assert_eq!(session.expires_at(), expires);
    assert_eq!(session.session_token().as_deref(), Some("tok1"));

    let url = session.url("/users").unwrap();
    assert_eq!(url, "https://home.test/users");
    let resp = session.send(NodeRequest::get(url)).await.unwrap();
    let users: Vec<SpaceUser> = resp.json().unwrap();
    assert_eq!(users[0].user_id, "u1");
    assert_eq!(fake.verified_calls(), 1);

    let sent = fake.last_request().unwrap();
    assert_eq!(sent.header(HEADER_AUTH_KEY), Some("tok1"));
    assert!(sent.header(HEADER_AUTH_TOKEN).is_some());
}

#[tokio::test]
async fn signed_request_verifies_with_node_responder() {
    let fake = FakeNode::new();
    fake.set_session_token("tok1");
    let session = session(&fake);
    session.authenticate().await.unwrap();

    let mut req = NodeRequest::get("https://home.test/user/u1");
    session.sign_request(&mut req).unwrap();
    let caller = fake
        .responder()
        .verify(
            &req.url,
            req.header(HEADER_AUTH_KEY).unwrap(),
            req.header(HEADER_AUTH_TOKEN).unwrap(),
            now_ms(),
        )
        .unwrap();
    assert_eq!(caller.user_id, "u1");
    assert_eq!(caller.device_name, "dev1");
}

#[tokio::test]
async fn tampered_url_fails_verification() {
    let fake = FakeNode::new();
    let session = session(&fake);
    session.authenticate().await.unwrap();

    let mut req = NodeRequest::get("https://home.test/user/u1");
    session.sign_request(&mut req).unwrap();
    req.url = "https://home.test/user/u2".into();

    let err = session.send(req).await.unwrap_err();
    assert!(matches!(err, Error::Node { code: 1002, .. }), "got {err:?}");
    assert_eq!(fake.verified_calls(), 0);
}

#[tokio::test]
async fn unknown_route_surfaces_structured_error() {
    let fake = FakeNode::new();
    let session = session(&fake);
    session.authenticate().await.unwrap();

    let err = session
        .send(NodeRequest::get(session.url("/nope").unwrap()))
        .await
        .unwrap_err();
    match err {
        Error::Node { code, message } => {
            assert_eq!(code, 1004);
            assert_eq!(message, "Not Found");
        }
        other => panic!("expected node error, got {other:?}"),
    }
}

#[tokio::test]
async fn expiry_in_the_past_never_authenticates() {
    let fake = FakeNode::new();
    fake.set_behavior(Behavior::ExpiresAt(now_ms() - 1));
    let session = session(&fake);

    // The handshake itself succeeds; the session is simply already stale.
    assert!(session.authenticate().await.unwrap());
    assert!(!session.is_authenticated());
    assert!(!session.wait_for_auth(Duration::from_millis(30)).await);
}

#[tokio::test]
async fn started_session_becomes_ready_and_stops_cleanly() {
    let fake = FakeNode::new();
    let session = session(&fake);
    session.start();
    assert!(session.wait_for_auth(Duration::from_secs(5)).await);
    assert!(session.is_refreshing());

    session.stop().await;
    assert!(!session.is_refreshing());
    // Stopping does not invalidate the session already established.
    assert!(session.is_authenticated());
}
