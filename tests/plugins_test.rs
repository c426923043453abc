//! Tests for the plugin chain as driven by the client.

mod common;

use common::{client, MockTransport, Reply};
use requestkit::plugins::errortips::{error_tips_plugin, ErrorTipsOptions, Tip, TipCategory};
use requestkit::plugins::loading::loading_plugin;
use requestkit::plugins::logger::{logger_plugin, DebugStore, LoggerOptions};
use requestkit::{ErrorKind, Plugin, RequestDescriptor, RequestError, RequestExtras, RetryPolicy};
use requestkit::http::retry::FixedDelay;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn test_plugins_run_in_registration_order() {
    let mock = MockTransport::new();
    let client = client(&mock);
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["p1", "p2"] {
        let on_request = order.clone();
        let on_response = order.clone();
        client.use_plugin(
            Plugin::new(name)
                .on_request(move |_| {
                    on_request.lock().unwrap().push(format!("{name}:request"));
                    None
                })
                .on_response(move |_| {
                    on_response.lock().unwrap().push(format!("{name}:response"));
                    None
                }),
        );
    }

    client.get("/ordered").await.unwrap();
    assert_eq!(
        *order.lock().unwrap(),
        vec!["p1:request", "p2:request", "p1:response", "p2:response"]
    );
    assert_eq!(client.plugins(), vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_request_hook_reaches_transport() {
    let mock = MockTransport::new();
    let client = client(&mock);
    client.use_request(|req| Some(req.clone().with_header("Authorization", "Bearer t0k3n")));

    client.get("/me").await.unwrap();
    assert_eq!(
        mock.requests()[0].headers.get("authorization").unwrap(),
        "Bearer t0k3n"
    );
}

#[tokio::test]
async fn test_response_hook_replaces_response() {
    let mock = MockTransport::always(Reply::json(200, json!({"data": [1, 2, 3]})));
    let client = client(&mock);
    client.use_response(|res| {
        let mut res = res.clone();
        let data = res.body()["data"].clone();
        *res.body_mut() = data;
        Some(res)
    });

    let res = client.get("/list").await.unwrap();
    assert_eq!(res.body(), &json!([1, 2, 3]));
}

#[tokio::test]
async fn test_error_hook_cannot_suppress_failure() {
    let mock = MockTransport::always(Reply::json(401, json!(null)));
    let client = client(&mock);
    client.use_error(|err| {
        let request = err.request().cloned().unwrap_or_else(|| RequestDescriptor::new(http::Method::GET, ""));
        Some(RequestError::new(ErrorKind::Other(format!("wrapped: {err}"))).with_request(request))
    });

    let err = client.get("/secret").await.unwrap_err();
    assert_eq!(err.to_string(), "wrapped: HTTP 401 Unauthorized");
}

#[tokio::test(start_paused = true)]
async fn test_hooks_run_per_attempt() {
    let mock = MockTransport::always(Reply::json(503, json!(null)));
    let client = client(&mock);
    let errors = Arc::new(Mutex::new(0));
    let sink = errors.clone();
    client.use_error(move |_| {
        *sink.lock().unwrap() += 1;
        None
    });

    let policy = RetryPolicy::times(2).with_strategy(FixedDelay(Duration::from_millis(5)));
    client
        .request(
            RequestDescriptor::new(http::Method::GET, "/busy"),
            RequestExtras::default().retry(policy),
        )
        .await
        .unwrap_err();
    assert_eq!(*errors.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_loading_plugin_balanced() {
    let mock = MockTransport::new();
    mock.push(Reply::json(200, json!(null)))
        .push(Reply::json(500, json!(null)));
    let client = client(&mock);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    client.use_plugin(loading_plugin(move |key, active| {
        sink.lock().unwrap().push((key.to_string(), active));
    }));

    client.get("/ok").await.unwrap();
    client.get("/fail").await.unwrap_err();

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            ("GET|/ok||".to_string(), true),
            ("GET|/ok||".to_string(), false),
            ("GET|/fail||".to_string(), true),
            ("GET|/fail||".to_string(), false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_logger_plugin_records_duration() {
    let mock = MockTransport::always(Reply::json(200, json!({"id": 1})).after(Duration::from_millis(250)));
    let client = client(&mock);
    let store = DebugStore::new();
    client.use_plugin(logger_plugin(store.clone(), LoggerOptions { enabled: Some(true) }));

    client.get("/users/1").await.unwrap();

    let logs = store.list();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].url, "/users/1");
    assert_eq!(logs[0].status, Some(200));
    assert_eq!(logs[0].duration_ms, 250);
    assert_eq!(logs[0].response, Some(json!({"id": 1})));
}

#[tokio::test]
async fn test_error_tips_business_and_server() {
    let mock = MockTransport::new();
    mock.push(Reply::json(200, json!({"code": 1001, "message": "quota exceeded"})))
        .push(Reply::json(502, json!(null)))
        .push(Reply::error(ErrorKind::Network("refused".into())));
    let client = client(&mock);
    let tips: Arc<Mutex<Vec<Tip>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = tips.clone();
    client.use_plugin(error_tips_plugin(ErrorTipsOptions::with_notifier(move |tip| {
        sink.lock().unwrap().push(tip.clone())
    })));

    let res = client.get("/quota").await.unwrap();
    assert_eq!(res.body()["code"], 1001);
    client.get("/gateway").await.unwrap_err();
    client.get("/offline").await.unwrap_err();

    let categories: Vec<TipCategory> = tips.lock().unwrap().iter().map(|t| t.category).collect();
    assert_eq!(
        categories,
        vec![TipCategory::Business, TipCategory::Server, TipCategory::Network]
    );
}

#[tokio::test]
#[should_panic(expected = "hook exploded")]
async fn test_panicking_hook_is_not_shielded() {
    let mock = MockTransport::new();
    let client = client(&mock);
    client.use_request(|_| panic!("hook exploded"));
    let _ = client.get("/x").await;
}
