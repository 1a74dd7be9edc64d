use serde_json::json;

use super::init_log;
use super::server::{reply, TestServer};
use crate::{Error, Options, ResponseType};

#[tokio::test]
async fn get_json() {
    init_log();

    let server = TestServer::start(|_| {
        reply("200 OK", &[("content-type", "application/json")], b"{\"a\":1}")
    })
    .await;

    let res = crate::get(&server.url("/ok"), Options::new()).await.unwrap();

    assert_eq!(res.status, 200);
    assert_eq!(res.status_text.as_deref(), Some("OK"));
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.data.as_json(), Some(&json!({"a": 1})));

    let req = server.last_request();
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/ok");
    assert_eq!(req.header("accept"), Some("*/*"));
    assert_eq!(req.header("content-type"), Some("application/octet-stream"));
    assert_eq!(req.header("content-length"), None);
    assert_eq!(req.header("connection"), Some("close"));
    assert_eq!(req.header("host"), Some(server.host().as_str()));
}

#[tokio::test]
async fn get_text() {
    init_log();

    let server = TestServer::start(|_| reply("200 OK", &[("content-type", "text/plain")], b"hello")).await;

    let res = crate::get(&server.url("/"), Options::new()).await.unwrap();
    assert_eq!(res.data.as_text(), Some("hello"));
}

#[tokio::test]
async fn path_and_query_sent_as_is() {
    init_log();

    let server = TestServer::start(|_| reply("200 OK", &[], b"")).await;

    crate::get(&server.url("/search/a?q=a%20b&x=1"), Options::new())
        .await
        .unwrap();

    assert_eq!(server.last_request().path, "/search/a?q=a%20b&x=1");
}

#[tokio::test]
async fn get_buffer_keeps_bytes() {
    init_log();

    let server = TestServer::start(|_| {
        reply("200 OK", &[("content-type", "application/json")], &[0, 255, 1])
    })
    .await;

    let res = crate::get_buffer(&server.url("/bin"), Options::new())
        .await
        .unwrap();

    assert_eq!(&res.data.as_bytes().unwrap()[..], &[0, 255, 1]);
}

#[tokio::test]
async fn chunked_response() {
    init_log();

    let server = TestServer::start(|_| {
        reply(
            "200 OK",
            &[("transfer-encoding", "chunked")],
            b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
        )
    })
    .await;

    let res = crate::get(&server.url("/"), Options::new()).await.unwrap();
    assert_eq!(res.data.as_text(), Some("hello world"));
}

#[tokio::test]
async fn close_delimited_response() {
    init_log();

    let server = TestServer::start(|_| b"HTTP/1.0 200 OK\r\n\r\nuntil close".to_vec()).await;

    let res = crate::get(&server.url("/"), Options::new()).await.unwrap();
    assert_eq!(res.data.as_text(), Some("until close"));
}

#[tokio::test]
async fn no_content() {
    init_log();

    let server = TestServer::start(|_| b"HTTP/1.1 204 No Content\r\n\r\n".to_vec()).await;

    let res = crate::get(&server.url("/"), Options::new()).await.unwrap();
    assert_eq!(res.status, 204);
    assert_eq!(res.status_text.as_deref(), Some("No Content"));
    assert_eq!(res.data.as_text(), Some(""));
}

#[tokio::test]
async fn error_status_is_a_response() {
    init_log();

    let server = TestServer::start(|_| reply("404 Not Found", &[], b"nope")).await;

    let res = crate::get(&server.url("/"), Options::new()).await.unwrap();
    assert_eq!(res.status, 404);
    assert_eq!(res.data.as_text(), Some("nope"));
}

#[tokio::test]
async fn repeated_response_headers() {
    init_log();

    let server = TestServer::start(|_| {
        reply("200 OK", &[("set-cookie", "a=1"), ("set-cookie", "b=2")], b"")
    })
    .await;

    let res = crate::get(&server.url("/"), Options::new()).await.unwrap();
    let cookies: Vec<_> = res.headers.get_all("set-cookie").iter().collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
}

#[tokio::test]
async fn invalid_json_rejects() {
    init_log();

    let server = TestServer::start(|_| {
        reply("200 OK", &[("content-type", "application/json")], b"{nope")
    })
    .await;

    let err = crate::get(&server.url("/"), Options::new()).await.unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[tokio::test]
async fn truncated_body_rejects() {
    init_log();

    let server = TestServer::start(|_| reply("200 OK", &[("content-length", "10")], b"abc")).await;

    let err = crate::get(&server.url("/"), Options::new()).await.unwrap_err();
    assert!(matches!(err, Error::ResponseIncomplete));
}

#[tokio::test]
async fn delete_has_no_body() {
    init_log();

    let server = TestServer::start(|_| reply("200 OK", &[], b"")).await;

    let options = Options::new().body("ignored");
    crate::delete(&server.url("/item/1"), options).await.unwrap();

    let req = server.last_request();
    assert_eq!(req.method, "DELETE");
    assert_eq!(req.header("content-length"), None);
    assert!(req.body.is_empty());
}

#[tokio::test]
async fn response_type_from_options() {
    init_log();

    let server = TestServer::start(|_| reply("200 OK", &[], b"raw")).await;

    let options = Options::new().response_type(ResponseType::ArrayBuffer);
    let res = crate::request(&server.url("/"), options).await.unwrap();
    assert_eq!(&res.data.as_bytes().unwrap()[..], b"raw");
}

#[tokio::test]
async fn connection_refused() {
    init_log();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = crate::get(&format!("http://{}/", addr), Options::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
