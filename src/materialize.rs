use http::{header, HeaderMap};

use crate::response::{BodyStream, Data, Response};
use crate::{Error, ResponseType};

/// Status line and headers of the final response.
#[derive(Debug)]
pub(crate) struct Head {
    pub status: u16,
    pub status_text: Option<String>,
    pub headers: HeaderMap,
}

/// Turn the decoded body into the [`Data`] the caller asked for.
///
/// In stream mode this returns at once. Otherwise the whole body is read first,
/// and any error while reading fails the call.
pub(crate) async fn materialize(
    head: Head,
    body: BodyStream,
    response_type: ResponseType,
) -> Result<Response, Error> {
    let data = match response_type {
        ResponseType::Stream => Data::Stream(body),
        ResponseType::ArrayBuffer => Data::Bytes(body.collect_bytes().await?),
        ResponseType::Object => {
            let bytes = body.collect_bytes().await?;
            let text = String::from_utf8_lossy(&bytes).into_owned();

            if is_json(&head.headers) {
                Data::Json(serde_json::from_str(&text)?)
            } else {
                Data::Text(text)
            }
        }
    };

    Ok(Response {
        status: head.status,
        status_text: head.status_text,
        headers: head.headers,
        data,
    })
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}
