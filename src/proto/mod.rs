//! HTTP/1.1 wire protocol for a single exchange
//!
//! Sans-IO protocol impl, which means "writing" and "reading" are made via buffers
//! rather than the Write/Read std traits. The async driver in this crate owns the
//! socket and feeds the [`Flow`] with bytes.
//!
//! The [`Flow`] object attempts to encode correct HTTP/1.1 handling using
//! state variables, for example `Flow<SendRequest>` to represent the
//! lifecycle stage where we are to send the request.
//!
//! The states are:
//!
//! * **Prepare** - Inspect and amend the request before anything is written.
//! * **SendRequest** - Send the first row, which is the method, path
//!   and version as well as the request headers
//! * **SendBody** - Send the request body
//! * **RecvResponse** - Receive the response, meaning the status and
//!   version and the response headers
//! * **RecvBody** - Receive the response body
//! * **Cleanup** - Return the connection to the pool or close it
//!
//! Redirects are not part of this flow. Whether to follow a redirect is decided
//! as soon as the response headers are known, see [`crate::redirect`].
//!
//! ```text
//!            ┌──────────────────┐
//!            │     Prepare      │
//!            └──────────────────┘
//!                      │
//!                      ▼
//!            ┌──────────────────┐
//!         ┌──│   SendRequest    │
//!         │  └──────────────────┘
//!         │            │
//!         │            ▼
//!         │  ┌──────────────────┐
//!         │  │     SendBody     │
//!         │  └──────────────────┘
//!         │            │
//!         │            ▼
//!         └─▶┌──────────────────┐
//!            │   RecvResponse   │──┐
//!            └──────────────────┘  │
//!                      │           │
//!                      ▼           │
//!            ┌──────────────────┐  │
//!            │     RecvBody     │  │
//!            └──────────────────┘  │
//!                      │           │
//!                      ▼           │
//!            ┌──────────────────┐  │
//!            │     Cleanup      │◀─┘
//!            └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use minireq::proto::*;
//! use minireq::http::Request;
//!
//! let request = Request::post("http://example.test/my-path")
//!     .header("content-length", "5")
//!     .body(())
//!     .unwrap();
//!
//! let flow = Flow::new(request).unwrap();
//! let mut flow = flow.proceed();
//!
//! let mut output = vec![0_u8; 1024];
//! let n = flow.write(&mut output).unwrap();
//!
//! assert_eq!(&output[..n], b"\
//!     POST /my-path HTTP/1.1\r\n\
//!     content-length: 5\r\n\
//!     host: example.test\r\n\
//!     \r\n");
//!
//! let mut flow = match flow.proceed() {
//!     Some(SendRequestResult::SendBody(v)) => v,
//!     _ => panic!(),
//! };
//!
//! let (input_used, output_used) = flow.write(b"hello", &mut output).unwrap();
//! assert_eq!((input_used, output_used), (5, 5));
//!
//! let mut flow = flow.proceed().unwrap();
//!
//! let input = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi";
//! let (input_used, response) = flow.try_response(input).unwrap();
//! assert_eq!(input_used, 38);
//! assert_eq!(response.unwrap().status(), 200);
//!
//! let mut flow = match flow.proceed() {
//!     Some(RecvResponseResult::RecvBody(v)) => v,
//!     _ => panic!(),
//! };
//!
//! let (_, output_used) = flow.read(&input[input_used..], &mut output).unwrap();
//! assert_eq!(&output[..output_used], b"hi");
//!
//! let flow = flow.proceed().unwrap();
//! assert!(!flow.must_close_connection());
//! ```

use std::fmt;
use std::io::Write;
use std::marker::PhantomData;

use http::uri::Scheme;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Response};
use http::{StatusCode, Uri, Version};

use self::body::{parse_content_length, BodyReader, BodyWriter};
use self::ext::{HeaderIterExt, MethodExt, SchemeExt};
use self::parser::try_parse_response;
use self::util::{log_data, Writer};
use crate::{CloseReason, Error};

mod body;
mod ext;
mod parser;
mod util;


pub use body::BodyMode;
pub use parser::Reason;

/// Max number of headers to parse from an HTTP response
pub const MAX_RESPONSE_HEADERS: usize = 128;

/// State types for the Flow state machine.
#[doc(hidden)]
pub mod state {
    pub(crate) trait Named {
        fn name() -> &'static str;
    }

    macro_rules! flow_state {
        ($n:tt) => {
            #[doc(hidden)]
            pub struct $n(());
            impl Named for $n {
                fn name() -> &'static str {
                    stringify!($n)
                }
            }
        };
    }

    flow_state!(Prepare);
    flow_state!(SendRequest);
    flow_state!(SendBody);
    flow_state!(RecvResponse);
    flow_state!(RecvBody);
    flow_state!(Cleanup);
}
use self::state::*;

/// A flow of states for one HTTP request/response exchange.
///
/// See the [state graph][crate::proto] for the transitions.
pub struct Flow<State> {
    inner: Inner,
    _ph: PhantomData<State>,
}

// pub(crate) for tests to inspect state
#[derive(Debug)]
pub(crate) struct Inner {
    pub request: Request<()>,
    pub analyzed: bool,
    pub phase: RequestPhase,
    pub writer: BodyWriter,
    pub reader: Option<BodyReader>,
    pub close_reason: Vec<CloseReason>,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum RequestPhase {
    #[default]
    SendLine,
    SendHeaders(usize),
    SendBody,
}

impl RequestPhase {
    fn is_prelude(&self) -> bool {
        matches!(self, RequestPhase::SendLine | RequestPhase::SendHeaders(_))
    }

    fn is_body(&self) -> bool {
        matches!(self, RequestPhase::SendBody)
    }
}

impl<S: Named> Flow<S> {
    fn wrap(inner: Inner) -> Flow<S> {
        let wrapped = Flow {
            inner,
            _ph: PhantomData,
        };

        debug!("{:?}", wrapped);

        wrapped
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// PREPARE

impl Flow<Prepare> {
    /// Create a new Flow.
    ///
    /// Only HTTP/1.0 and HTTP/1.1 requests are accepted.
    pub fn new(request: Request<()>) -> Result<Self, Error> {
        let version = request.version();

        if version != Version::HTTP_10 && version != Version::HTTP_11 {
            return Err(Error::UnsupportedVersion);
        }

        let mut close_reason = Vec::new();

        if version == Version::HTTP_10 {
            close_reason.push(CloseReason::Http10);
        }

        if request.headers().iter().has(header::CONNECTION, "close") {
            close_reason.push(CloseReason::ClientConnectionClose);
        }

        let inner = Inner {
            request,
            analyzed: false,
            phase: RequestPhase::default(),
            writer: BodyWriter::new_none(),
            reader: None,
            close_reason,
        };

        Ok(Flow::wrap(inner))
    }

    /// Inspect call method
    pub fn method(&self) -> &Method {
        self.inner.request.method()
    }

    /// Inspect call URI
    pub fn uri(&self) -> &Uri {
        self.inner.request.uri()
    }

    /// Inspect call headers
    pub fn headers(&self) -> &HeaderMap {
        self.inner.request.headers()
    }

    /// Add more headers to the call
    pub fn header<K, V>(&mut self, key: K, value: V) -> Result<(), Error>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(key).map_err(|e| {
            let e: http::Error = e.into();
            Error::from(e)
        })?;
        let value = HeaderValue::try_from(value).map_err(|e| {
            let e: http::Error = e.into();
            Error::from(e)
        })?;

        if name == header::CONNECTION
            && value.to_str().is_ok_and(|v| v.eq_ignore_ascii_case("close"))
        {
            self.inner
                .close_reason
                .push(CloseReason::ClientConnectionClose);
        }

        self.inner.request.headers_mut().append(name, value);
        Ok(())
    }

    /// Continue to the next flow state.
    pub fn proceed(self) -> Flow<SendRequest> {
        Flow::wrap(self.inner)
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// SEND REQUEST

impl Flow<SendRequest> {
    /// Write the request to the buffer.
    ///
    /// Writes incrementally, it can be called repeatedly in situations where the output
    /// buffer is small.
    ///
    /// This includes the first row, i.e. `GET / HTTP/1.1` and all headers.
    /// The output buffer needs to be large enough for the longest row.
    ///
    /// If the output is too small for the longest line, the result is an `OutputOverflow` error.
    ///
    /// The `Ok(usize)` is the number of bytes of the `output` buffer that was used.
    pub fn write(&mut self, output: &mut [u8]) -> Result<usize, Error> {
        self.maybe_analyze_request()?;

        let mut w = Writer::new(output);
        try_write_prelude(&self.inner.request, &mut self.inner.phase, &mut w)?;

        let output_used = w.len();
        Ok(output_used)
    }

    /// The configured method.
    pub fn method(&self) -> &Method {
        self.inner.request.method()
    }

    /// The uri being requested.
    pub fn uri(&self) -> &Uri {
        self.inner.request.uri()
    }

    /// The headers as they go on the wire.
    ///
    /// Only complete after the first `write()`, which adds the `host` header.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.request.headers()
    }

    /// Check whether the entire request prelude has been sent.
    pub fn can_proceed(&self) -> bool {
        !self.inner.phase.is_prelude()
    }

    /// Attempt to proceed from this state to the next.
    ///
    /// Returns `None` if the entire request has not been sent. It is guaranteed that if
    /// `can_proceed()` returns `true`, this will return `Some`.
    pub fn proceed(self) -> Option<SendRequestResult> {
        if !self.can_proceed() {
            return None;
        }

        if self.inner.writer.has_body() {
            Some(SendRequestResult::SendBody(Flow::wrap(self.inner)))
        } else {
            Some(SendRequestResult::RecvResponse(Flow::wrap(self.inner)))
        }
    }

    fn maybe_analyze_request(&mut self) -> Result<(), Error> {
        if self.inner.analyzed {
            return Ok(());
        }

        let request = &mut self.inner.request;
        let method = request.method();
        let version = request.version();

        let method_ok = if version == Version::HTTP_10 {
            method.is_http10()
        } else {
            method.is_http11()
        };

        if !method_ok {
            return Err(Error::MethodVersionMismatch(method.clone(), version));
        }

        let mut lengths = request.headers().get_all(header::CONTENT_LENGTH).iter();

        if let Some(value) = lengths.next() {
            if lengths.next().is_some() {
                return Err(Error::TooManyContentLengthHeaders);
            }
            let len = parse_content_length(value.as_bytes())?;
            self.inner.writer = BodyWriter::new_delimited(len);
        }

        if !request.headers().contains_key(header::HOST) {
            if let Some(host) = request.uri().host() {
                // This might append the port if it differs from the scheme default.
                let value = maybe_with_port(host, request.uri())?;
                request.headers_mut().insert(header::HOST, value);
            }
        }

        self.inner.analyzed = true;
        Ok(())
    }
}

fn maybe_with_port(host: &str, uri: &Uri) -> Result<HeaderValue, Error> {
    fn from_str(src: &str) -> Result<HeaderValue, Error> {
        HeaderValue::from_str(src).map_err(|e| Error::BadHeader(e.to_string()))
    }

    if let Some(port) = uri.port_u16() {
        let scheme = uri.scheme().unwrap_or(&Scheme::HTTP);
        if scheme.default_port() != Some(port) {
            return from_str(&format!("{}:{}", host, port));
        }
    }

    from_str(host)
}

fn try_write_prelude(
    request: &Request<()>,
    phase: &mut RequestPhase,
    w: &mut Writer,
) -> Result<(), Error> {
    let at_start = w.len();

    while try_write_prelude_part(request, phase, w) {}

    if w.len() > at_start || phase.is_body() {
        Ok(())
    } else {
        Err(Error::OutputOverflow)
    }
}

fn try_write_prelude_part(request: &Request<()>, phase: &mut RequestPhase, w: &mut Writer) -> bool {
    match phase {
        RequestPhase::SendLine => {
            let path = request
                .uri()
                .path_and_query()
                .map(|p| p.as_str())
                .unwrap_or("/");

            let success = w.try_write(|w| {
                write!(w, "{} {} {:?}\r\n", request.method(), path, request.version())
            });

            if success {
                *phase = RequestPhase::SendHeaders(0);
            }
            success
        }

        RequestPhase::SendHeaders(index) => match request.headers().iter().nth(*index) {
            Some((name, value)) => {
                let success = w.try_write(|w| {
                    write!(w, "{}: ", name)?;
                    w.write_all(value.as_bytes())?;
                    write!(w, "\r\n")
                });

                if success {
                    *index += 1;
                }
                success
            }
            None => {
                let success = w.try_write(|w| write!(w, "\r\n"));
                if success {
                    *phase = RequestPhase::SendBody;
                }
                success
            }
        },

        // We're past the header.
        RequestPhase::SendBody => false,
    }
}

/// Possible state transitions after sending the request prelude.
pub enum SendRequestResult {
    /// Send the request body.
    SendBody(Flow<SendBody>),

    /// Receive the response.
    RecvResponse(Flow<RecvResponse>),
}

// //////////////////////////////////////////////////////////////////////////////////////////// SEND BODY

impl Flow<SendBody> {
    /// Write request body from `input` to `output`.
    ///
    /// The result `(usize, usize)` is `(input consumed, output used)`.
    pub fn write(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize), Error> {
        let writer = &mut self.inner.writer;

        if !input.is_empty() && writer.is_ended() {
            return Err(Error::BodyContentAfterFinish);
        }

        if let Some(left) = writer.left_to_send() {
            if input.len() as u64 > left {
                return Err(Error::BodyLargerThanContentLength);
            }
        }

        let mut w = Writer::new(output);
        let input_used = writer.write(input, &mut w);

        Ok((input_used, w.len()))
    }

    /// Helper to avoid copying memory.
    ///
    /// The body is not framed, so the caller can write it straight to the
    /// transport and report the amount here instead of calling `write()`.
    pub fn consume_direct_write(&mut self, amount: usize) -> Result<(), Error> {
        let writer = &mut self.inner.writer;

        if amount > 0 && writer.is_ended() {
            return Err(Error::BodyContentAfterFinish);
        }

        if let Some(left) = writer.left_to_send() {
            if amount as u64 > left {
                return Err(Error::BodyLargerThanContentLength);
            }
        }

        writer.consume_direct_write(amount);
        Ok(())
    }

    /// Check whether the request body is fully sent.
    pub fn can_proceed(&self) -> bool {
        self.inner.writer.is_ended()
    }

    /// Proceed to the next state.
    ///
    /// Returns `None` if it's not possible to proceed. It's guaranteed that if `can_proceed()` returns
    /// `true`, this will result in `Some`.
    pub fn proceed(self) -> Option<Flow<RecvResponse>> {
        if !self.can_proceed() {
            return None;
        }

        Some(Flow::wrap(self.inner))
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// RECV RESPONSE

impl Flow<RecvResponse> {
    /// Try reading a response from the input.
    ///
    /// The `(usize, Option<Response()>)` is `(input amount consumed, response`).
    ///
    /// Interim `1xx` responses are consumed and discarded, in which case the amount
    /// consumed is non-zero while the response is `None`.
    pub fn try_response(&mut self, input: &[u8]) -> Result<(usize, Option<Response<()>>), Error> {
        let Some((input_used, response)) = try_parse_response::<MAX_RESPONSE_HEADERS>(input)?
        else {
            // Not enough input for a full response yet
            return Ok((0, None));
        };

        log_data(&input[..input_used]);

        let status = response.status();

        if status.is_informational() {
            if status == StatusCode::CONTINUE && !response.headers().is_empty() {
                return Err(Error::HeadersWith100);
            }
            debug!("Discard interim response: {}", status);
            return Ok((input_used, None));
        }

        let http10 = response.version() == Version::HTTP_10;

        let reader = BodyReader::for_response(
            http10,
            self.inner.request.method(),
            status.as_u16(),
            response.headers(),
        )?;

        if http10 && !self.inner.close_reason.contains(&CloseReason::Http10) {
            self.inner.close_reason.push(CloseReason::Http10);
        }

        if response.headers().iter().has(header::CONNECTION, "close") {
            self.inner
                .close_reason
                .push(CloseReason::ServerConnectionClose);
        }

        self.inner.reader = Some(reader);

        Ok((input_used, Some(response)))
    }

    /// Tell if we have finished receiving the response.
    pub fn can_proceed(&self) -> bool {
        self.inner.reader.is_some()
    }

    /// Proceed to the next state.
    ///
    /// This returns `None` if we have not finished receiving the response. It is guaranteed that if
    /// `can_proceed()` returns true, this will return `Some`.
    pub fn proceed(mut self) -> Option<RecvResponseResult> {
        let reader = self.inner.reader.as_ref()?;

        if reader.is_ended() {
            return Some(RecvResponseResult::Cleanup(Flow::wrap(self.inner)));
        }

        if matches!(reader, BodyReader::CloseDelimited) {
            self.inner
                .close_reason
                .push(CloseReason::CloseDelimitedBody);
        }

        Some(RecvResponseResult::RecvBody(Flow::wrap(self.inner)))
    }
}

/// The possible states after receiving a response.
pub enum RecvResponseResult {
    /// Receive a response body.
    RecvBody(Flow<RecvBody>),

    /// Run cleanup, there is no body.
    Cleanup(Flow<Cleanup>),
}

// //////////////////////////////////////////////////////////////////////////////////////////// RECV BODY

impl Flow<RecvBody> {
    /// Read the response body from `input` to `output`.
    ///
    /// Depending on response headers, we can be in `transfer-encoding: chunked` or not. If we are,
    /// there will be less `output` bytes than `input`.
    ///
    /// The result `(usize, usize)` is `(input consumed, output buffer used)`.
    pub fn read(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize), Error> {
        let reader = self.reader_mut();

        if reader.is_ended() {
            return Ok((0, 0));
        }

        reader.read(input, output)
    }

    /// Tell which kind of mode the response body is.
    pub fn body_mode(&self) -> BodyMode {
        self.reader().body_mode()
    }

    /// Tell if the response body has been fully received.
    pub fn is_ended(&self) -> bool {
        self.reader().is_ended()
    }

    /// Tell if response body is closed delimited
    ///
    /// HTTP/1.0 does not have `content-length` to serialize many requests over the same
    /// socket. Instead it uses socket close to determine the body is finished.
    pub fn is_close_delimited(&self) -> bool {
        matches!(self.reader(), BodyReader::CloseDelimited)
    }

    /// Check if the response body has been fully received.
    ///
    /// A close delimited body can always proceed, since only the transport knows
    /// when it ends.
    pub fn can_proceed(&self) -> bool {
        self.is_ended() || self.is_close_delimited()
    }

    /// Proceed to the next state.
    ///
    /// Returns `None` if we are not fully received the body. It is guaranteed that if `can_proceed()`
    /// returns `true`, this will return `Some`.
    pub fn proceed(self) -> Option<Flow<Cleanup>> {
        if !self.can_proceed() {
            return None;
        }

        Some(Flow::wrap(self.inner))
    }

    fn reader(&self) -> &BodyReader {
        // Unwrap is OK, we can't be in RecvBody without having read a response.
        self.inner.reader.as_ref().unwrap()
    }

    fn reader_mut(&mut self) -> &mut BodyReader {
        self.inner.reader.as_mut().unwrap()
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// CLEANUP

impl Flow<Cleanup> {
    /// Tell if we must close the connection.
    pub fn must_close_connection(&self) -> bool {
        self.close_reason().is_some()
    }

    /// If we are closing the connection, give a reason.
    pub fn close_reason(&self) -> Option<&'static str> {
        self.inner.close_reason.first().map(|s| s.explain())
    }
}

// ////////////////////////////////////////////////////////////////////////////////////////////

impl<State: Named> fmt::Debug for Flow<State> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flow<{}>", State::name())
    }
}

impl fmt::Debug for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendLine => write!(f, "SendLine"),
            Self::SendHeaders(_) => write!(f, "SendHeaders"),
            Self::SendBody => write!(f, "SendBody"),
        }
    }
}
