use std::fmt;
use std::io;

use http::{Method, Version};

/// Error type for minireq
#[derive(Debug)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    InvalidUrl(String),
    BadHeader(String),
    UnsupportedVersion,
    MethodVersionMismatch(Method, Version),
    TooManyContentLengthHeaders,
    BadContentLengthHeader,
    OutputOverflow,
    ChunkLenNotAscii,
    ChunkLenNotANumber,
    ChunkExpectedCrLf,
    BodyContentAfterFinish,
    BodyLargerThanContentLength,
    BodySmallerThanContentLength,
    HttpParseFail(String),
    HttpParseTooManyHeaders,
    HeadersWith100,
    ResponseIncomplete,
    TooManyRedirects(u32),
    NotBuffered,
    TlsUnavailable,
    Tls(String),
    Io(io::Error),
    Decompress(io::Error),
    Json(serde_json::Error),
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        Error::HttpParseFail(value.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value)
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Error::InvalidUrl(value.to_string())
    }
}

impl From<http::Error> for Error {
    fn from(value: http::Error) -> Self {
        Error::BadHeader(value.to_string())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Decompress(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidUrl(v) => write!(f, "invalid url: {}", v),
            Error::BadHeader(v) => write!(f, "bad header: {}", v),
            Error::UnsupportedVersion => write!(f, "unsupported http version"),
            Error::MethodVersionMismatch(m, v) => {
                write!(f, "{} not valid for HTTP version {:?}", m, v)
            }
            Error::TooManyContentLengthHeaders => write!(f, "more than one content-length header"),
            Error::BadContentLengthHeader => write!(f, "content-length header not a number"),
            Error::OutputOverflow => write!(f, "output too small to write output"),
            Error::ChunkLenNotAscii => write!(f, "chunk length is not ascii"),
            Error::ChunkLenNotANumber => write!(f, "chunk length cannot be read as a number"),
            Error::ChunkExpectedCrLf => write!(f, "chunk expected crlf as next character"),
            Error::BodyContentAfterFinish => write!(f, "attempt to send body after it ended"),
            Error::BodyLargerThanContentLength => {
                write!(f, "attempt to write larger body than content-length")
            }
            Error::BodySmallerThanContentLength => {
                write!(f, "body ended before content-length was reached")
            }
            Error::HttpParseFail(v) => write!(f, "http parse fail: {}", v),
            Error::HttpParseTooManyHeaders => write!(f, "http parse resulted in too many headers"),
            Error::HeadersWith100 => write!(f, "received headers with 100-continue response"),
            Error::ResponseIncomplete => write!(f, "connection closed before response ended"),
            Error::TooManyRedirects(n) => write!(f, "more than {} redirects", n),
            Error::NotBuffered => write!(f, "response body is a stream"),
            Error::TlsUnavailable => write!(f, "https requested but tls support is not enabled"),
            Error::Tls(v) => write!(f, "tls: {}", v),
            Error::Io(e) => write!(f, "io: {}", e),
            Error::Decompress(e) => write!(f, "decompress: {}", e),
            Error::Json(e) => write!(f, "json: {}", e),
        }
    }
}
