//! Typed node API calls against the in-process fake node.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use sn_directory::{DirectoryContext, SpaceNodeDirectory};
use sn_domain::config::Config;
use sn_domain::Error;
use sn_node_api::{NodeApiClient, SpaceNodeApi};
use sn_protocol::{HEADER_AUTH_KEY, HEADER_AUTH_TOKEN};
use sn_session::testing::{self, FakeConnector, FakeNode};
use sn_session::NodeSession;

async fn client(fake: &Arc<FakeNode>) -> NodeApiClient {
    let session = Arc::new(
        NodeSession::new(
            Arc::new(fake.node_ref("home", Some("S1"))),
            testing::device_identity(),
            fake.clone(),
            testing::fast_options(),
        )
        .unwrap(),
    );
    assert!(session.authenticate().await.unwrap());
    NodeApiClient::new(session)
}

#[tokio::test]
async fn lists_space_users_with_signed_request() {
    let fake = FakeNode::new();
    fake.route(
        Method::GET,
        "/users",
        200,
        &json!([
            { "userID": "u1", "name": "norm", "isOwner": true, "devices": [
                { "deviceID": "d1", "name": "laptop", "enabled": true }
            ]},
            { "userID": "u2", "name": "ann" }
        ]),
    );
    let api = client(&fake).await;

    let users = api.space_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert!(users[0].is_owner);
    assert_eq!(users[0].devices[0].device_id, "d1");
    assert!(!users[1].is_admin);

    let sent = fake.last_request().unwrap();
    assert_eq!(sent.url, "https://home.test/users");
    assert!(sent.header(HEADER_AUTH_KEY).is_some());
    assert!(sent.header(HEADER_AUTH_TOKEN).is_some());
    assert_eq!(fake.verified_calls(), 1);
}

#[tokio::test]
async fn updates_user_flags() {
    let fake = FakeNode::new();
    fake.route(
        Method::PUT,
        "/user/u2",
        200,
        &json!({ "userID": "u2", "name": "ann", "isAdmin": true, "enableSiteBlocking": true }),
    );
    let api = client(&fake).await;

    let user = api.update_space_user("u2", true, true).await.unwrap();
    assert!(user.is_admin);
    assert!(user.enable_site_blocking);

    let body = fake.last_request().unwrap().body.unwrap();
    assert_eq!(body, json!({ "isSpaceAdmin": true, "enableSiteBlocking": true }));
}

#[tokio::test]
async fn disabling_a_device_sends_enabled_false() {
    let fake = FakeNode::new();
    fake.route(
        Method::PUT,
        "/user/u1/device/d1",
        200,
        &json!({ "deviceID": "d1", "name": "laptop", "enabled": false }),
    );
    fake.route(
        Method::GET,
        "/user/u1/device/d1",
        200,
        &json!({ "deviceID": "d1", "name": "laptop", "enabled": false }),
    );
    let api = client(&fake).await;

    let device = api.enable_user_device("u1", "d1", false).await.unwrap();
    assert!(!device.enabled);
    let body = fake.last_request().unwrap().body.unwrap();
    assert_eq!(body, json!({ "enabled": false }));

    let fetched = api.user_device("u1", "d1").await.unwrap();
    assert_eq!(fetched, device);
}

#[tokio::test]
async fn connect_and_disconnect() {
    let fake = FakeNode::new();
    fake.route(
        Method::POST,
        "/connect",
        200,
        &json!({ "name": "home", "vpnType": "wireguard", "config": { "address": "192.168.111.2/32" } }),
    );
    fake.route(Method::DELETE, "/connect", 200, &json!({}));
    let api = client(&fake).await;

    let vpn = api.connect("ck-1").await.unwrap();
    assert_eq!(vpn.vpn_type, "wireguard");
    assert_eq!(vpn.config["address"], "192.168.111.2/32");
    let body = fake.last_request().unwrap().body.unwrap();
    assert_eq!(body, json!({ "deviceConnectKey": "ck-1" }));

    api.disconnect().await.unwrap();
    assert_eq!(fake.last_request().unwrap().method, Method::DELETE);
}

#[tokio::test]
async fn mesh_auth_key_keeps_extra_fields() {
    let fake = FakeNode::new();
    fake.route(
        Method::POST,
        "/mycs/device/meshAuthKey",
        200,
        &json!({ "authKey": "mk-123", "expiresAt": 42, "dnsConfigured": true }),
    );
    let api = client(&fake).await;

    let key = api.create_mesh_auth_key(60_000).await.unwrap();
    assert_eq!(key.auth_key, "mk-123");
    assert_eq!(key.expires_at, 42);
    assert_eq!(key.extra["dnsConfigured"], true);
    let body = fake.last_request().unwrap().body.unwrap();
    assert_eq!(body, json!({ "expiresIn": 60000 }));
}

#[tokio::test]
async fn node_errors_surface_as_node_error() {
    let fake = FakeNode::new();
    fake.route(
        Method::GET,
        "/user/ghost",
        400,
        &json!({ "errorCode": 1010, "errorMessage": "user not found" }),
    );
    let api = client(&fake).await;

    match api.space_user("ghost").await.unwrap_err() {
        Error::Node { code, message } => {
            assert_eq!(code, 1010);
            assert_eq!(message, "user not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    match api.space_users().await.unwrap_err() {
        Error::Node { code, .. } => assert_eq!(code, 1004),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_reply_is_invalid_response() {
    let fake = FakeNode::new();
    fake.route(Method::GET, "/users", 200, &json!({ "not": "a list" }));
    let api = client(&fake).await;
    assert!(matches!(
        api.space_users().await.unwrap_err(),
        Error::InvalidResponse(_)
    ));
}

#[tokio::test]
async fn path_segments_are_escaped() {
    let fake = FakeNode::new();
    let api = client(&fake).await;
    let _ = api.space_user("a b/c").await;
    assert_eq!(
        fake.last_request().unwrap().url,
        "https://home.test/user/a%20b%2Fc"
    );
}

#[tokio::test]
async fn acquire_and_release_through_directory() {
    let fake = FakeNode::new();
    fake.route(Method::GET, "/users", 200, &json!([]));
    let ctx = DirectoryContext::new(testing::device_identity(), &Config::default())
        .with_connector(Arc::new(FakeConnector::new(fake.clone())))
        .with_session_options(testing::fast_options());
    let targets = vec![sn_directory::ManagedTarget {
        key: "home".into(),
        has_bastion: true,
        space_id: Some("S1".into()),
        endpoint: Some("https://home.test".into()),
        public_key: fake.node_ref("home", None).public_key().into(),
        status: sn_domain::NodeStatus::Running,
        can_use_as_egress: false,
        ca_root: None,
        state_error: None,
    }];
    let dir = SpaceNodeDirectory::local_only(&targets, ctx);
    let home = dir.lookup_by_key("home", None).unwrap();

    let api = NodeApiClient::acquire(&dir, &home, Duration::from_secs(5)).await.unwrap();
    assert!(api.is_running());
    assert!(api.space_users().await.unwrap().is_empty());
    assert_eq!(dir.pooled_sessions(), vec!["S1".to_string()]);

    api.release(&dir).await;
    assert!(dir.pooled_sessions().is_empty());
}
