//! Minimal async HTTP(S) client.
//!
//! One call makes one logical request: the URL picks plain or TLS transport,
//! redirects are followed, the body is decompressed according to
//! `content-encoding` and handed back either buffered (JSON, text or bytes) or
//! as a live stream.
//!
//! ```no_run
//! use minireq::{Data, Options};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), minireq::Error> {
//! let res = minireq::get("http://example.test/ok", Options::new()).await?;
//!
//! if let Data::Json(value) = &res.data {
//!     println!("{}: {}", res.status, value);
//! }
//!
//! let res = minireq::post("http://example.test/echo", json!({"a": 1}), Options::new()).await?;
//! assert_eq!(res.status, 200);
//!
//! let mut stream = minireq::get_stream("http://example.test/big", Options::new())
//!     .await?
//!     .data
//!     .into_stream()
//!     .unwrap();
//!
//! while let Some(chunk) = stream.chunk().await? {
//!     println!("{} bytes", chunk.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Defaults
//!
//! Unless set by the caller, requests carry `accept: */*` and a `content-type`,
//! which is `application/json` for text and JSON bodies and
//! `application/octet-stream` otherwise. Whether the caller set them is checked
//! with the exact lower case key, so `Accept` set by the caller is replaced by
//! the default. `content-length` is always set from the body.
//!
//! # Redirects
//!
//! Any `3xx` with a `location` header is followed using the same [`Options`],
//! method and body included. There is no limit unless
//! [`Options::max_redirects`] is set.
//!
//! # Connections
//!
//! Without an [`Agent`] every call opens a connection and closes it after the
//! response. With one, connections are kept alive and reused.
//!
//! # TLS
//!
//! The `rustls` feature (on by default) provides `https://` using the webpki
//! root certificates. Without it, such URLs fail with [`Error::TlsUnavailable`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

use http::Method;

mod agent;
mod client;
mod close_reason;
mod decode;
mod dispatch;
mod error;
mod materialize;
mod options;
mod redirect;
mod response;
mod tls;
mod transport;

pub mod proto;

#[cfg(test)]
mod test;

pub use agent::Agent;
pub use close_reason::CloseReason;
pub use decode::ContentEncoding;
pub use error::Error;
pub use options::{Body, Options, ResponseType};
pub use response::{BodyStream, Data, Response};
pub use transport::Transport;

pub use http;

/// Make a request.
///
/// Everything about the request comes from `options`.
pub async fn request(url: &str, options: Options) -> Result<Response, Error> {
    client::run(url, &options).await
}

/// Make a request. Same as [`request`].
pub async fn get(url: &str, options: Options) -> Result<Response, Error> {
    request(url, options).await
}

/// `POST` the body.
pub async fn post(url: &str, body: impl Into<Body>, options: Options) -> Result<Response, Error> {
    request(url, options.method(Method::POST).body(body)).await
}

/// `PUT` the body.
pub async fn put(url: &str, body: impl Into<Body>, options: Options) -> Result<Response, Error> {
    request(url, options.method(Method::PUT).body(body)).await
}

/// `DELETE`, without a body.
///
/// A body set in `options` is dropped, not sent.
pub async fn delete(url: &str, options: Options) -> Result<Response, Error> {
    let mut options = options.method(Method::DELETE);
    options.body = None;
    request(url, options).await
}

/// Make a request and hand over the body as a [`BodyStream`].
///
/// Returns as soon as the status and headers are known.
pub async fn get_stream(url: &str, options: Options) -> Result<Response, Error> {
    request(url, options.response_type(ResponseType::Stream)).await
}

/// Make a request and buffer the body as raw bytes.
pub async fn get_buffer(url: &str, options: Options) -> Result<Response, Error> {
    request(url, options.response_type(ResponseType::ArrayBuffer)).await
}
