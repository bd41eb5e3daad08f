//! UDP client and discovery against a fake bulb on the loopback interface

use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_test::assert_ok;
use wiz_core::traits::{BulbDevice, BulbDiscovery, DeviceConnector};
use wiz_core::{Error, FailureKind};
use wiz_udp::{WizUdpConnector, WizUdpDiscovery};

type Received = Arc<Mutex<Vec<Value>>>;

/// Start a fake bulb on 127.0.0.1
///
/// `respond` gets the index and body of each request and returns the reply
/// datagram, if any. Returns the port and the requests received.
async fn fake_bulb<F>(respond: F) -> (u16, Received)
where
    F: Fn(usize, &Value) -> Option<Vec<u8>> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    let received: Received = Arc::default();
    let log = received.clone();

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        let mut index = 0;
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let request = serde_json::from_slice(&buf[..len]).unwrap_or(Value::Null);
            let reply = respond(index, &request);
            log.lock().unwrap().push(request);
            index += 1;
            if let Some(reply) = reply {
                let _ = socket.send_to(&reply, from).await;
            }
        }
    });

    (port, received)
}

fn reply(body: Value) -> Option<Vec<u8>> {
    Some(serde_json::to_vec(&body).unwrap())
}

fn connector(port: u16) -> WizUdpConnector {
    WizUdpConnector::new(port, Duration::from_millis(600), 3)
}

#[tokio::test]
async fn query_status_returns_pilot_result() {
    let (port, received) = fake_bulb(|_, _| {
        reply(json!({
            "method": "getPilot",
            "env": "pro",
            "result": { "mac": "a8bb50000000", "state": true, "sceneId": 11, "dimming": 100 }
        }))
    })
    .await;

    let bulb = assert_ok!(connector(port).connect("127.0.0.1").await);
    assert_eq!(bulb.address(), "127.0.0.1");
    let status = assert_ok!(bulb.query_status().await);

    assert_eq!(status.get("sceneId"), Some(&json!(11)));
    assert_eq!(status.get("state"), Some(&json!(true)));
    assert_eq!(
        received.lock().unwrap().clone(),
        vec![json!({ "method": "getPilot", "params": {} })]
    );
}

#[tokio::test]
async fn commands_send_set_pilot() {
    let (port, received) = fake_bulb(|_, _| {
        reply(json!({ "method": "setPilot", "env": "pro", "result": { "success": true } }))
    })
    .await;
    let bulb = connector(port).connect("127.0.0.1").await.unwrap();

    assert_ok!(bulb.apply_scene(11, Some(255)).await);
    assert_ok!(bulb.apply_scene(4, None).await);
    assert_ok!(bulb.power(false).await);

    let params: Vec<Value> = received
        .lock()
        .unwrap()
        .iter()
        .map(|r| r["params"].clone())
        .collect();
    assert_eq!(
        params,
        vec![
            json!({ "state": true, "sceneId": 11, "dimming": 100 }),
            json!({ "state": true, "sceneId": 4 }),
            json!({ "state": false }),
        ]
    );
}

#[tokio::test]
async fn lost_datagram_is_resent() {
    // The first request is dropped
    let (port, received) = fake_bulb(|index, _| {
        if index == 0 {
            None
        } else {
            reply(json!({ "method": "getPilot", "result": { "state": false } }))
        }
    })
    .await;
    let bulb = connector(port).connect("127.0.0.1").await.unwrap();

    let status = assert_ok!(bulb.query_status().await);

    assert_eq!(status.get("state"), Some(&json!(false)));
    assert_eq!(received.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn silent_bulb_times_out() {
    let (port, received) = fake_bulb(|_, _| None).await;
    let bulb = connector(port).connect("127.0.0.1").await.unwrap();

    let started = std::time::Instant::now();
    let err = bulb.query_status().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Timeout);
    assert_eq!(err.address(), "127.0.0.1");
    assert!(started.elapsed() >= Duration::from_millis(600));
    assert!(started.elapsed() < Duration::from_secs(2));
    // Every attempt was used within the timeout
    assert_eq!(received.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn bulb_error_is_protocol_failure() {
    let (port, _) = fake_bulb(|_, _| {
        reply(json!({
            "method": "setPilot",
            "error": { "code": -32600, "message": "Invalid Request" }
        }))
    })
    .await;
    let bulb = connector(port).connect("127.0.0.1").await.unwrap();

    let err = bulb.apply_scene(1000, None).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Protocol);
    assert!(err.to_string().contains("Invalid Request"));
}

#[tokio::test]
async fn malformed_reply_is_protocol_failure() {
    let (port, _) = fake_bulb(|_, _| Some(b"{not json".to_vec())).await;
    let bulb = connector(port).connect("127.0.0.1").await.unwrap();

    let err = bulb.query_status().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Protocol);
}

#[tokio::test]
async fn rejected_command_is_protocol_failure() {
    let (port, _) = fake_bulb(|_, _| {
        reply(json!({ "method": "setPilot", "result": { "success": false } }))
    })
    .await;
    let bulb = connector(port).connect("127.0.0.1").await.unwrap();

    let err = bulb.power(true).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Protocol);
}

#[tokio::test]
async fn unrelated_datagrams_are_skipped() {
    let (port, _) = fake_bulb(|_, _| {
        reply(json!({ "method": "syncPilot", "params": { "state": true } }))
    })
    .await;
    let bulb = WizUdpConnector::new(port, Duration::from_millis(200), 1)
        .connect("127.0.0.1")
        .await
        .unwrap();

    let err = bulb.query_status().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Timeout);
}

#[tokio::test]
async fn discovery_collects_responders_once() {
    let (port, received) = fake_bulb(|_, request| {
        (request["method"] == "registration").then(|| {
            serde_json::to_vec(&json!({
                "method": "registration",
                "env": "pro",
                "result": { "mac": "a8bb50000000", "success": true }
            }))
            .unwrap()
        })
    })
    .await;
    let discovery = WizUdpDiscovery::new(port, Duration::from_millis(1500));

    let found = assert_ok!(discovery.discover("127.0.0.1").await);

    // Two broadcasts within the wait, one address
    assert_eq!(found, vec!["127.0.0.1".to_string()]);
    let requests = received.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["params"]["register"], json!(false));
}

#[tokio::test]
async fn discovery_filters_by_network() {
    let (port, _) = fake_bulb(|_, _| {
        reply(json!({ "method": "registration", "result": { "success": true } }))
    })
    .await;
    let discovery = WizUdpDiscovery::new(port, Duration::from_millis(300));

    let inside = assert_ok!(discovery.discover("127.0.0.1/32").await);
    assert_eq!(inside, vec!["127.0.0.1".to_string()]);
}

#[tokio::test]
async fn discovery_ignores_other_replies() {
    let (port, _) = fake_bulb(|_, _| Some(b"hello".to_vec())).await;
    let discovery = WizUdpDiscovery::new(port, Duration::from_millis(300));

    let found = assert_ok!(discovery.discover("127.0.0.1").await);
    assert!(found.is_empty());
}

#[tokio::test]
async fn discovery_rejects_invalid_range() {
    let discovery = WizUdpDiscovery::new(38899, Duration::from_millis(100));

    let result = discovery.discover("10.0.0.0/40").await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}
