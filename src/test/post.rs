use http::Method;
use serde_json::json;

use super::init_log;
use super::server::{reply, Recorded, TestServer};
use crate::{Body, Options};

fn echo(req: &Recorded) -> Vec<u8> {
    let content_type = req.header("content-type").unwrap_or("none");
    reply("200 OK", &[("content-type", content_type)], &req.body)
}

#[tokio::test]
async fn post_json_body() {
    init_log();

    let server = TestServer::start(echo).await;

    let res = crate::post(&server.url("/echo"), json!({"a": 1}), Options::new())
        .await
        .unwrap();

    let req = server.last_request();
    assert_eq!(req.method, "POST");
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("content-length"), Some("7"));
    assert_eq!(req.body, b"{\"a\":1}");

    // Echoed back as JSON.
    assert_eq!(res.data.as_json(), Some(&json!({"a": 1})));
}

#[tokio::test]
async fn post_raw_bytes_unmodified() {
    init_log();

    let server = TestServer::start(echo).await;
    let bytes = vec![0_u8, 159, 146, 150, 13, 10];

    let res = crate::post(
        &server.url("/bin"),
        bytes.clone(),
        Options::new().response_type(crate::ResponseType::ArrayBuffer),
    )
    .await
    .unwrap();

    let req = server.last_request();
    assert_eq!(req.header("content-type"), Some("application/octet-stream"));
    assert_eq!(req.header("content-length"), Some("6"));
    assert_eq!(req.body, bytes);
    assert_eq!(&res.data.as_bytes().unwrap()[..], &bytes[..]);
}

#[tokio::test]
async fn put_text() {
    init_log();

    let server = TestServer::start(echo).await;

    crate::put(&server.url("/doc"), "plain", Options::new())
        .await
        .unwrap();

    let req = server.last_request();
    assert_eq!(req.method, "PUT");
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.body, b"plain");
}

#[tokio::test]
async fn any_method() {
    init_log();

    let server = TestServer::start(echo).await;

    for method in [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
        let options = Options::new().method(method.clone());
        crate::request(&server.url("/"), options).await.unwrap();
        assert_eq!(server.last_request().method, method.as_str());
    }
}

#[tokio::test]
async fn caller_headers() {
    init_log();

    let server = TestServer::start(echo).await;

    let options = Options::new()
        .header("content-type", "text/csv")
        .header("Accept", "text/html")
        .header("x-token", "abc");

    crate::post(&server.url("/"), "a,b", options).await.unwrap();

    let req = server.last_request();
    assert_eq!(req.header("content-type"), Some("text/csv"));
    assert_eq!(req.header("x-token"), Some("abc"));

    // Defaults are matched on the exact key, so `Accept` gets replaced.
    assert_eq!(req.header("accept"), Some("*/*"));
    assert_eq!(req.header_count("accept"), 1);
}

#[tokio::test]
async fn empty_text_body_not_sent() {
    init_log();

    let server = TestServer::start(echo).await;

    crate::post(&server.url("/"), Body::Text(String::new()), Options::new())
        .await
        .unwrap();

    let req = server.last_request();
    assert_eq!(req.header("content-length"), None);
    assert_eq!(req.header("content-type"), Some("application/octet-stream"));
    assert!(req.body.is_empty());
}
