//! Drives a [`Flow`] over a connection, and the redirect loop on top.

use bytes::{Buf, Bytes};
use futures_util::stream::{self, Stream};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::agent::Agent;
use crate::decode::{self, ContentEncoding};
use crate::dispatch::{self, Prepared};
use crate::materialize::{self, Head};
use crate::proto::state::{Cleanup, RecvBody};
use crate::proto::{Flow, Reason, RecvResponseResult, SendRequestResult};
use crate::redirect::{self, Hops};
use crate::transport::{self, Connection};
use crate::{Error, Options, Response};

/// Size of the buffers used to write the request and read the body.
const BUFFER_SIZE: usize = 16 * 1024;

/// Largest response status line and headers we buffer before giving up.
const MAX_RESPONSE_HEAD: usize = 64 * 1024;

/// Make a call, following redirects, and materialize the final response.
pub(crate) async fn run(url: &str, options: &Options) -> Result<Response, Error> {
    let mut url = url.to_string();
    let mut hops = Hops::new(options.max_redirects);

    loop {
        let prepared = dispatch::prepare(&url, options)?;
        let (head, body) = exchange(prepared, options.agent.as_ref()).await?;

        let location = redirect::location(head.status, &head.headers, options.follow_redirect);

        if let Some(location) = location {
            hops.next()?;
            debug!("Redirect {} to: {}", head.status, location);

            // The redirect body is never read, so its connection is dropped here.
            url = location.to_string();
            continue;
        }

        let encoding = ContentEncoding::from_headers(&head.headers);
        let body = decode::decode_stream(body.into_stream(), encoding);

        return materialize::materialize(head, body, options.response_type).await;
    }
}

/// Send one request and read the response head.
async fn exchange(prepared: Prepared, agent: Option<&Agent>) -> Result<(Head, RawBody), Error> {
    let Prepared {
        target,
        request,
        body,
    } = prepared;

    let pooled = agent.and_then(|a| a.checkout(&target));
    let mut conn = match pooled {
        Some(conn) => conn,
        None => transport::connect(&target).await?,
    };

    let flow = Flow::new(request)?;
    let mut flow = flow.proceed();

    let mut output = vec![0; BUFFER_SIZE];

    while !flow.can_proceed() {
        let n = flow.write(&mut output)?;
        conn.io.write_all(&output[..n]).await?;
    }

    let mut flow = match flow.proceed() {
        Some(SendRequestResult::SendBody(mut flow)) => {
            if let Some(body) = &body {
                // The body needs no framing, it goes straight to the socket.
                flow.consume_direct_write(body.len())?;
                conn.io.write_all(body).await?;
            }
            flow.proceed().ok_or(Error::BodySmallerThanContentLength)?
        }
        Some(SendRequestResult::RecvResponse(flow)) => flow,
        None => return Err(Error::OutputOverflow),
    };

    conn.io.flush().await?;

    let response = loop {
        if !conn.input.is_empty() {
            let (used, response) = flow.try_response(&conn.input)?;
            conn.input.advance(used);

            if let Some(response) = response {
                break response;
            }

            if used > 0 {
                // An interim 1xx was discarded, the real response may follow.
                continue;
            }
        }

        if conn.input.len() > MAX_RESPONSE_HEAD {
            return Err(Error::HttpParseFail("response head too large".to_string()));
        }

        if conn.io.read_buf(&mut conn.input).await? == 0 {
            return Err(Error::ResponseIncomplete);
        }
    };

    let (parts, ()) = response.into_parts();

    let head = Head {
        status: parts.status.as_u16(),
        status_text: parts
            .extensions
            .get::<Reason>()
            .map(|r| r.as_str())
            .filter(|r| !r.is_empty())
            .map(|r| r.to_string()),
        headers: parts.headers,
    };

    let next = flow.proceed().ok_or(Error::ResponseIncomplete)?;
    let body = RawBody::new(conn, next, agent.cloned());

    Ok((head, body))
}

/// The response body as it comes off the socket, with the transfer framing removed.
///
/// Once the body is fully read, the connection goes back to the agent when it
/// can be reused. If the body is dropped before that, so is the connection.
pub(crate) struct RawBody {
    conn: Option<Connection>,
    flow: Option<Flow<RecvBody>>,
    agent: Option<Agent>,
    buf: Vec<u8>,
}

impl RawBody {
    fn new(conn: Connection, next: RecvResponseResult, agent: Option<Agent>) -> Self {
        match next {
            RecvResponseResult::RecvBody(flow) => RawBody {
                conn: Some(conn),
                flow: Some(flow),
                agent,
                buf: vec![0; BUFFER_SIZE],
            },
            RecvResponseResult::Cleanup(flow) => {
                release(agent.as_ref(), conn, flow);
                RawBody {
                    conn: None,
                    flow: None,
                    agent,
                    buf: vec![],
                }
            }
        }
    }

    /// Next piece of body, `None` when the body has ended.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        loop {
            let (Some(conn), Some(flow)) = (self.conn.as_mut(), self.flow.as_mut()) else {
                return Ok(None);
            };

            if flow.is_ended() {
                break;
            }

            if !conn.input.is_empty() {
                let (used, n) = flow.read(&conn.input, &mut self.buf)?;
                conn.input.advance(used);

                if n > 0 {
                    return Ok(Some(Bytes::copy_from_slice(&self.buf[..n])));
                }

                if used > 0 {
                    // Only chunk framing was consumed.
                    continue;
                }
            }

            if conn.io.read_buf(&mut conn.input).await? == 0 {
                if flow.is_close_delimited() {
                    break;
                }
                return Err(Error::ResponseIncomplete);
            }
        }

        self.finish();
        Ok(None)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Error>> + Send + Unpin {
        Box::pin(stream::try_unfold(self, |mut body| async move {
            let chunk = body.next_chunk().await?;
            Ok(chunk.map(|c| (c, body)))
        }))
    }

    fn finish(&mut self) {
        let (Some(conn), Some(flow)) = (self.conn.take(), self.flow.take()) else {
            return;
        };

        if let Some(flow) = flow.proceed() {
            release(self.agent.as_ref(), conn, flow);
        }
    }
}

fn release(agent: Option<&Agent>, conn: Connection, flow: Flow<Cleanup>) {
    let Some(agent) = agent else {
        return;
    };

    if let Some(reason) = flow.close_reason() {
        debug!("Close connection: {}", reason);
        return;
    }

    if !conn.input.is_empty() {
        debug!("Close connection: unread input after response");
        return;
    }

    agent.checkin(conn);
}
