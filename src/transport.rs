use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures_util::task::noop_waker_ref;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::Error;

/// Which kind of socket a request goes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Plain TCP.
    Plain,
    /// TLS over TCP.
    Encrypted,
}

impl Transport {
    /// Pick the transport for a URL.
    ///
    /// Only a literal, lower case `https://` prefix selects [`Transport::Encrypted`].
    pub fn for_url(url: &str) -> Self {
        if url.starts_with("https://") {
            Transport::Encrypted
        } else {
            Transport::Plain
        }
    }

    pub(crate) fn scheme(&self) -> &'static str {
        match self {
            Transport::Plain => "http",
            Transport::Encrypted => "https",
        }
    }

    pub(crate) fn default_port(&self) -> u16 {
        match self {
            Transport::Plain => 80,
            Transport::Encrypted => 443,
        }
    }
}

/// Where to open a connection. Also the key for pooled connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Target {
    pub transport: Transport,
    /// Host name or IP address, without IPv6 brackets.
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.transport.scheme(), self.host, self.port)
    }
}

pub(crate) trait Io: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

/// An open socket and the bytes read from it that no flow has consumed yet.
pub(crate) struct Connection {
    pub target: Target,
    pub io: Box<dyn Io>,
    pub input: BytesMut,
}

impl Connection {
    pub fn new(target: Target, io: Box<dyn Io>) -> Self {
        Connection {
            target,
            io,
            input: BytesMut::with_capacity(16 * 1024),
        }
    }

    /// Tell if an idle connection can take another request.
    ///
    /// Polls the socket once without waiting. A connection that is idle should
    /// have nothing to read, so both end of file and unsolicited bytes mean it
    /// is not reusable.
    pub fn is_reusable(&mut self) -> bool {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut scratch = [0_u8; 1];
        let mut buf = ReadBuf::new(&mut scratch);

        match Pin::new(&mut self.io).poll_read(&mut cx, &mut buf) {
            Poll::Pending => true,
            Poll::Ready(Ok(())) if buf.filled().is_empty() => {
                debug!("Pooled connection closed by peer: {}", self.target);
                false
            }
            Poll::Ready(Ok(())) => {
                debug!("Pooled connection has unexpected input: {}", self.target);
                false
            }
            Poll::Ready(Err(e)) => {
                debug!("Pooled connection failed: {}: {}", self.target, e);
                false
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .field("input", &self.input.len())
            .finish()
    }
}

pub(crate) async fn connect(target: &Target) -> Result<Connection, Error> {
    debug!("Connect to {}", target);

    let stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
    stream.set_nodelay(true)?;

    let io: Box<dyn Io> = match target.transport {
        Transport::Plain => Box::new(stream),
        Transport::Encrypted => crate::tls::wrap(stream, &target.host).await?,
    };

    Ok(Connection::new(target.clone(), io))
}
