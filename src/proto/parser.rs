use http::{Response, StatusCode, Version};

use crate::Error;

/// Reason phrase of a response status line, e.g. `OK` or `Not Found`.
///
/// Stored as an extension on the parsed `Response<()>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason(String);

impl Reason {
    /// The reason phrase as sent by the server.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Try to parse a complete response prelude (status line and headers).
///
/// `Ok(None)` means more input is needed.
pub(crate) fn try_parse_response<const N: usize>(
    input: &[u8],
) -> Result<Option<(usize, Response<()>)>, Error> {
    let mut headers = [httparse::EMPTY_HEADER; N];
    let mut res = httparse::Response::new(&mut headers);

    let input_used = match res.parse(input) {
        Ok(httparse::Status::Complete(v)) => v,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => return Err(Error::HttpParseTooManyHeaders),
        Err(e) => return Err(e.into()),
    };

    let version = match res.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        _ => return Err(Error::UnsupportedVersion),
    };

    let status = res
        .code
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(|| Error::HttpParseFail("bad status code".to_string()))?;

    let reason = Reason(res.reason.unwrap_or_default().to_string());

    let mut builder = Response::builder()
        .version(version)
        .status(status)
        .extension(reason);

    for h in res.headers.iter() {
        builder = builder.header(h.name, h.value);
    }

    let response = builder.body(())?;

    Ok(Some((input_used, response)))
}
