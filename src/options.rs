use bytes::Bytes;
use http::Method;
use serde::Serialize;
use serde_json::Value;

use crate::{Agent, Error};

/// How the response body is handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Buffer the body, parse as JSON when the `content-type` says so,
    /// otherwise keep it as text.
    #[default]
    Object,
    /// Buffer the body as raw bytes.
    ArrayBuffer,
    /// Hand out the live, decoded body stream.
    Stream,
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Raw bytes, sent as is with `application/octet-stream` by default.
    Bytes(Bytes),
    /// Text, sent as is.
    Text(String),
    /// Structured value, serialized as JSON.
    Json(Value),
}

impl Body {
    /// Serialize any value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Body, Error> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// The bytes to put on the wire, and whether they count as raw bytes.
    ///
    /// An empty text body is the same as no body at all.
    pub(crate) fn normalize(&self) -> Result<Option<(Bytes, bool)>, Error> {
        let (bytes, raw) = match self {
            Body::Bytes(v) => return Ok(Some((v.clone(), true))),
            Body::Text(v) => (Bytes::from(v.clone()), false),
            Body::Json(Value::String(v)) => (Bytes::from(v.clone()), false),
            Body::Json(v) => (Bytes::from(serde_json::to_vec(v)?), false),
        };

        if bytes.is_empty() {
            return Ok(None);
        }

        Ok(Some((bytes, raw)))
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(value.into())
    }
}

impl From<&'static [u8]> for Body {
    fn from(value: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(value))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

/// Options for one call.
///
/// Options are reused unchanged for every redirect hop of the call.
///
/// ```
/// use minireq::{Options, ResponseType};
///
/// let options = Options::new()
///     .header("x-api-key", "secret")
///     .follow_redirect(false)
///     .response_type(ResponseType::ArrayBuffer);
///
/// assert_eq!(options.headers.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Request method, `GET` when unset.
    pub method: Option<Method>,

    /// Request headers in the order they were added.
    ///
    /// Keys are unique by exact, case-sensitive match. The defaults for
    /// `accept` and `content-type` are only skipped if the key is spelled
    /// exactly like that, in lower case.
    pub headers: Vec<(String, String)>,

    /// Request body.
    pub body: Option<Body>,

    /// Whether to follow `3xx` responses with a `location` header.
    pub follow_redirect: bool,

    /// Connection pool to reuse connections from.
    pub agent: Option<Agent>,

    /// How to hand over the response body.
    pub response_type: ResponseType,

    /// Upper bound on redirect hops. `None` follows redirects without limit.
    pub max_redirects: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            method: None,
            headers: vec![],
            body: None,
            follow_redirect: true,
            agent: None,
            response_type: ResponseType::default(),
            max_redirects: None,
        }
    }
}

impl Options {
    /// Default options, a `GET` that follows redirects.
    pub fn new() -> Self {
        Options::default()
    }

    /// Set the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set a header, replacing a previous value for the exact same key.
    ///
    /// Default headers are only skipped when set with their lowercase name. A caller
    /// setting `Accept` still gets the default `accept: */*` in its place.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();

        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key, value)),
        }

        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Turn following redirects on or off.
    pub fn follow_redirect(mut self, follow: bool) -> Self {
        self.follow_redirect = follow;
        self
    }

    /// Reuse connections from this pool.
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Set how the response body is handed over.
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Fail the call when more than `max` redirects are followed.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = Some(max);
        self
    }

    pub(crate) fn has_header(&self, key: &str) -> bool {
        self.headers.iter().any(|(k, _)| k == key)
    }
}
