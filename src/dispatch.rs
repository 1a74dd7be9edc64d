//! Turn a URL and [`Options`] into something to put on the wire.

use bytes::Bytes;
use http::{header, HeaderValue, Method, Request, Uri};
use url::Url;

use crate::transport::{Target, Transport};
use crate::{Error, Options};

/// A request ready to be sent.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub target: Target,
    pub request: Request<()>,
    pub body: Option<Bytes>,
}

pub(crate) fn prepare(url: &str, options: &Options) -> Result<Prepared, Error> {
    let transport = Transport::for_url(url);
    let parsed = Url::parse(url)?;

    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(format!("no host in: {}", url)))?;

    let port = parsed.port().unwrap_or(transport.default_port());

    let authority = if port == transport.default_port() {
        host.to_string()
    } else {
        format!("{}:{}", host, port)
    };

    let path = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };

    let uri = Uri::builder()
        .scheme(transport.scheme())
        .authority(authority)
        .path_and_query(path)
        .build()
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let method = options.method.clone().unwrap_or(Method::GET);

    let body = match &options.body {
        Some(body) => body.normalize()?,
        None => None,
    };

    let mut builder = Request::builder().method(method.clone()).uri(uri);
    for (key, value) in &options.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    let mut request = builder.body(())?;

    // Defaults are checked against the exact key the caller used. The outgoing
    // map is case insensitive, so `Accept` from the caller is replaced here.
    let headers = request.headers_mut();

    if !options.has_header("accept") {
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    }

    if !options.has_header("content-type") {
        let content_type = match &body {
            Some((_, false)) => "application/json",
            _ => "application/octet-stream",
        };
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    if let Some((bytes, _)) = &body {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    }

    if options.agent.is_none() && !headers.contains_key(header::CONNECTION) {
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    }

    info!("{} {}", method, url);

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    Ok(Prepared {
        target: Target {
            transport,
            host: host.to_string(),
            port,
        },
        request,
        body: body.map(|(bytes, _)| bytes),
    })
}
