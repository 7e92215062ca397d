//! Operator API against a running gateway.

use binfleet::api::{Method, handle};
use serde_json::Value;

use super::mock_adapters::{MAIN, start, wait_until};

fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[test]
fn snapshot_reflects_telemetry() {
    let mut g = start();
    g.sim.inject(MAIN, b"status-4-1");
    wait_until("bin 4 update", || {
        let r = handle(&g.handle, Method::Get, "/snapshot", b"");
        json(&r.body)["bins"][3]["label"] == "1/3 Full"
    });

    let r = handle(&g.handle, Method::Get, "/snapshot", b"");
    assert_eq!(r.status, 200);
    let v = json(&r.body);
    assert_eq!(v["bins"].as_array().unwrap().len(), 5);
    assert_eq!(v["bins"][3]["id"], 4);
    assert_eq!(v["bins"][3]["status"], "one_third");
    assert!(v["bins"][3]["lastUpdated"].is_u64());
    assert_eq!(v["bins"][0]["lastUpdated"], Value::Null);
    assert_eq!(v["events"][0]["topic"], ">>>");
    assert_eq!(v["events"][0]["message"], "Bin 4: 1/3 Full");
    assert_eq!(v["link"], "subscribed");
    assert!(g.handle.shutdown());
}

#[test]
fn command_lifecycle_over_api() {
    let mut g = start();
    let collect = br#"{"kind":"collect","binId":2}"#;

    let r = handle(&g.handle, Method::Post, "/command", collect);
    assert_eq!((r.status, json(&r.body)["accepted"].clone()), (202, "collect".into()));

    let r = handle(&g.handle, Method::Post, "/command", collect);
    assert_eq!(r.status, 409);
    assert_eq!(json(&r.body)["error"], "validation: collect already pending for bin");

    let r = handle(&g.handle, Method::Post, "/bins/2/reset", b"");
    assert_eq!(r.status, 200);
    let r = handle(&g.handle, Method::Post, "/command", collect);
    assert_eq!(r.status, 202);

    let v = json(&handle(&g.handle, Method::Get, "/snapshot", b"").body);
    let outbound: Vec<&Value> = v["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["topic"] == "<<<")
        .collect();
    assert_eq!(outbound.len(), 2);
    assert_eq!(outbound[0]["message"], "Collecting bin 2");
    assert!(g.handle.shutdown());
}

#[test]
fn validation_failures_map_to_client_errors() {
    let mut g = start();
    let cases: [(&[u8], u16); 4] = [
        (br#"{"kind":"collect","binId":6}"#, 422),
        (br#"{"kind":"dock","binId":1}"#, 422),
        (br#"{"kind":"raw","payload":"x"}"#, 422),
        (b"{", 400),
    ];
    for (body, status) in cases {
        assert_eq!(
            handle(&g.handle, Method::Post, "/command", body).status,
            status,
            "{}",
            String::from_utf8_lossy(body)
        );
    }
    assert!(g.sim.published().is_empty());
    assert!(g.handle.shutdown());
}

#[test]
fn stopped_gateway_answers_503() {
    let mut g = start();
    assert!(g.handle.shutdown());
    let r = handle(&g.handle, Method::Post, "/command", br#"{"kind":"calibrate"}"#);
    assert_eq!(r.status, 503);
    let r = handle(&g.handle, Method::Post, "/bins/1/reset", b"");
    assert_eq!(r.status, 503);
    let r = handle(&g.handle, Method::Get, "/health", b"");
    assert_eq!(json(&r.body)["link"], "disconnected");
}
