use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Error;

/// The result of a call.
///
/// Status and headers are those of the last response when redirects were followed.
#[derive(Debug)]
pub struct Response {
    /// Status code, e.g. `200`.
    pub status: u16,
    /// Reason phrase from the status line, if the server sent one.
    pub status_text: Option<String>,
    /// Response headers. Repeated headers keep all their values.
    pub headers: HeaderMap,
    /// The body, in the shape asked for by the [`ResponseType`][crate::ResponseType].
    pub data: Data,
}

impl Response {
    /// First value of a header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Deserialize a buffered body into `T`.
    ///
    /// Works on any buffered body. Text and bytes are parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = match &self.data {
            Data::Json(v) => serde_json::from_value(v.clone())?,
            Data::Text(v) => serde_json::from_str(v)?,
            Data::Bytes(v) => serde_json::from_slice(v)?,
            Data::Stream(_) => return Err(Error::NotBuffered),
        };
        Ok(value)
    }
}

/// Response body. Exactly one variant is set per response.
pub enum Data {
    /// Body parsed as JSON since the `content-type` was `application/json`.
    Json(Value),
    /// Body decoded as UTF-8 text.
    Text(String),
    /// Raw body bytes, after decompression.
    Bytes(Bytes),
    /// Live body stream, after decompression.
    Stream(BodyStream),
}

impl Data {
    /// The parsed JSON value, if the body was parsed as JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Data::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The text, if the body was kept as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Data::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The raw bytes, if the body was buffered as bytes.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Data::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Take the live stream out of a stream mode response.
    pub fn into_stream(self) -> Option<BodyStream> {
        match self {
            Data::Stream(v) => Some(v),
            _ => None,
        }
    }

    /// Tell if this is a live stream.
    pub fn is_stream(&self) -> bool {
        matches!(self, Data::Stream(_))
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Data::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Data::Bytes(v) => f.debug_tuple("Bytes").field(&v.len()).finish(),
            Data::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// Decoded response body, read as it arrives from the server.
///
/// Read and decompression errors come out of the stream. The stream ends after
/// the last byte of the body, at which point the connection is released.
pub struct BodyStream {
    inner: BoxStream<'static, Result<Bytes, Error>>,
}

impl BodyStream {
    pub(crate) fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        BodyStream {
            inner: stream.boxed(),
        }
    }

    /// Next chunk of the body, `None` at the end.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, Error> {
        self.inner.next().await.transpose()
    }

    /// Read the rest of the body into one buffer.
    pub async fn collect_bytes(mut self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();

        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }

        Ok(buf.freeze())
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyStream")
    }
}
