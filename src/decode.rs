//! Incremental decompression of response bodies.

use std::io::{self, Write};

use bytes::Bytes;
use flate2::write::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use futures_util::stream::{self, Stream, TryStreamExt};
use http::{header, HeaderMap};

use crate::{BodyStream, Error};

const BROTLI_BUFFER: usize = 4096;

/// Smallest free space we hand to the inflater per round.
const INFLATE_SPARE: usize = 8 * 1024;

/// Compression named by the `content-encoding` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// Anything not recognized, including no header at all.
    Identity,
    /// `gzip`
    Gzip,
    /// `deflate`, which is zlib wrapped.
    Deflate,
    /// `br`
    Brotli,
}

impl ContentEncoding {
    /// Only the exact values `gzip`, `deflate` and `br` are recognized.
    /// Lists of encodings and other casings pass through undecoded.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let value = headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok());

        match value {
            Some("gzip") => ContentEncoding::Gzip,
            Some("deflate") => ContentEncoding::Deflate,
            Some("br") => ContentEncoding::Brotli,
            _ => ContentEncoding::Identity,
        }
    }
}

/// Decompresses body chunks as they arrive.
pub(crate) enum Decoder {
    Identity,
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(Inflate),
    Brotli(Box<brotli::DecompressorWriter<Vec<u8>>>),
}

impl Decoder {
    pub fn new(encoding: ContentEncoding) -> Self {
        if encoding != ContentEncoding::Identity {
            debug!("Decode body: {:?}", encoding);
        }

        match encoding {
            ContentEncoding::Identity => Decoder::Identity,
            ContentEncoding::Gzip => Decoder::Gzip(GzDecoder::new(Vec::new())),
            ContentEncoding::Deflate => Decoder::Deflate(Inflate::new()),
            ContentEncoding::Brotli => Decoder::Brotli(Box::new(brotli::DecompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER,
            ))),
        }
    }

    /// Feed one chunk of raw body. Returns whatever could be decoded so far,
    /// which may be empty.
    pub fn decode(&mut self, input: Bytes) -> Result<Bytes, Error> {
        let out = match self {
            Decoder::Identity => return Ok(input),
            Decoder::Gzip(d) => {
                write_flush(d, &input)?;
                d.get_mut()
            }
            Decoder::Deflate(d) => return d.inflate(&input).map(Bytes::from),
            Decoder::Brotli(d) => {
                write_flush(d.as_mut(), &input)?;
                d.get_mut()
            }
        };

        Ok(std::mem::take(out).into())
    }

    /// End of raw body. Returns the remaining decoded bytes.
    pub fn finish(self) -> Result<Bytes, Error> {
        let out = match self {
            Decoder::Identity => return Ok(Bytes::new()),
            Decoder::Gzip(d) => d.finish().map_err(Error::Decompress)?,
            Decoder::Deflate(d) => {
                d.finish()?;
                Vec::new()
            }
            Decoder::Brotli(d) => (*d).into_inner().map_err(|_| {
                Error::Decompress(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "brotli stream ended early",
                ))
            })?,
        };

        Ok(out.into())
    }
}

/// zlib inflater that knows whether the stream reached its end marker.
pub(crate) struct Inflate {
    inner: Decompress,
    ended: bool,
}

impl Inflate {
    fn new() -> Self {
        Inflate {
            inner: Decompress::new(true),
            ended: false,
        }
    }

    fn inflate(&mut self, mut input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(input.len() * 2 + INFLATE_SPARE);

        // Anything after the end marker is ignored.
        while !self.ended {
            if out.capacity() - out.len() < INFLATE_SPARE {
                out.reserve(INFLATE_SPARE);
            }

            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();

            let status = self
                .inner
                .decompress_vec(input, &mut out, FlushDecompress::None)
                .map_err(|e| Error::Decompress(e.into()))?;

            let used = (self.inner.total_in() - before_in) as usize;
            input = &input[used..];

            match status {
                Status::StreamEnd => self.ended = true,
                _ if used == 0 && self.inner.total_out() == before_out => break,
                _ => {}
            }
        }

        Ok(out)
    }

    fn finish(self) -> Result<(), Error> {
        if !self.ended {
            return Err(Error::Decompress(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "deflate stream ended early",
            )));
        }
        Ok(())
    }
}

/// Wrap a raw body stream in the decoder for `encoding`.
///
/// Chunks that decode to nothing are not passed on. An empty raw body is an
/// empty decoded body, whatever the encoding.
pub(crate) fn decode_stream<S>(raw: S, encoding: ContentEncoding) -> BodyStream
where
    S: Stream<Item = Result<Bytes, Error>> + Send + Unpin + 'static,
{
    let state = (raw, Some(Decoder::new(encoding)), false);

    BodyStream::new(stream::try_unfold(state, |(mut raw, decoder, mut fed)| async move {
        let Some(mut decoder) = decoder else {
            return Ok(None);
        };

        while let Some(chunk) = raw.try_next().await? {
            fed |= !chunk.is_empty();
            let out = decoder.decode(chunk)?;
            if !out.is_empty() {
                return Ok(Some((out, (raw, Some(decoder), fed))));
            }
        }

        if !fed {
            return Ok(None);
        }

        let out = decoder.finish()?;
        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some((out, (raw, None, fed))))
        }
    }))
}

fn write_flush<W: Write>(w: &mut W, input: &[u8]) -> Result<(), Error> {
    w.write_all(input).map_err(Error::Decompress)?;
    w.flush().map_err(Error::Decompress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;

    const TEXT: &[u8] = b"{\"message\":\"hello hello hello hello hello\"}";

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut e = GzEncoder::new(Vec::new(), Compression::default());
        e.write_all(data).unwrap();
        e.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
        e.write_all(data).unwrap();
        e.finish().unwrap()
    }

    fn brotli(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut w = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
            w.write_all(data).unwrap();
        }
        out
    }

    fn decode_in_pieces(encoding: ContentEncoding, data: &[u8], size: usize) -> Vec<u8> {
        let mut d = Decoder::new(encoding);
        let mut out = Vec::new();
        for chunk in data.chunks(size) {
            out.extend_from_slice(&d.decode(Bytes::copy_from_slice(chunk)).unwrap());
        }
        out.extend_from_slice(&d.finish().unwrap());
        out
    }

    fn headers(encoding: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::CONTENT_ENCODING, encoding.parse().unwrap());
        map
    }

    #[test]
    fn encoding_exact_match() {
        assert_eq!(ContentEncoding::from_headers(&headers("gzip")), ContentEncoding::Gzip);
        assert_eq!(
            ContentEncoding::from_headers(&headers("deflate")),
            ContentEncoding::Deflate
        );
        assert_eq!(ContentEncoding::from_headers(&headers("br")), ContentEncoding::Brotli);
        assert_eq!(
            ContentEncoding::from_headers(&headers("GZIP")),
            ContentEncoding::Identity
        );
        assert_eq!(
            ContentEncoding::from_headers(&headers("gzip, br")),
            ContentEncoding::Identity
        );
        assert_eq!(
            ContentEncoding::from_headers(&HeaderMap::new()),
            ContentEncoding::Identity
        );
    }

    #[test]
    fn identity_passes_through() {
        let out = decode_in_pieces(ContentEncoding::Identity, TEXT, 5);
        assert_eq!(out, TEXT);
    }

    #[test]
    fn gzip_in_small_pieces() {
        let out = decode_in_pieces(ContentEncoding::Gzip, &gzip(TEXT), 3);
        assert_eq!(out, TEXT);
    }

    #[test]
    fn deflate_is_zlib() {
        let out = decode_in_pieces(ContentEncoding::Deflate, &zlib(TEXT), 7);
        assert_eq!(out, TEXT);
    }

    #[test]
    fn brotli_in_small_pieces() {
        let out = decode_in_pieces(ContentEncoding::Brotli, &brotli(TEXT), 4);
        assert_eq!(out, TEXT);
    }

    #[test]
    fn corrupt_deflate() {
        let mut d = Decoder::new(ContentEncoding::Deflate);
        let err = d
            .decode(Bytes::from_static(b"this is not compressed"))
            .unwrap_err();
        assert!(matches!(err, Error::Decompress(_)));
    }

    #[test]
    fn truncated_deflate() {
        let data: Vec<u8> = (0..5000_u32).map(|i| (i * 7 % 251) as u8).collect();
        let compressed = zlib(&data);

        let mut d = Decoder::new(ContentEncoding::Deflate);
        let half = Bytes::copy_from_slice(&compressed[..compressed.len() / 2]);
        d.decode(half).unwrap();

        let err = d.finish().unwrap_err();
        assert!(matches!(err, Error::Decompress(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn deflate_large_output() {
        let data = vec![b'a'; 200_000];
        let out = decode_in_pieces(ContentEncoding::Deflate, &zlib(&data), 64);
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn empty_body_with_encoding() {
        for encoding in [
            ContentEncoding::Gzip,
            ContentEncoding::Deflate,
            ContentEncoding::Brotli,
        ] {
            let body = decode_stream(stream::empty(), encoding);
            assert!(body.collect_bytes().await.unwrap().is_empty());
        }
    }

    #[test]
    fn corrupt_gzip() {
        let mut d = Decoder::new(ContentEncoding::Gzip);
        let err = d
            .decode(Bytes::from_static(b"this is not compressed"))
            .and_then(|_| d.finish())
            .unwrap_err();
        assert!(matches!(err, Error::Decompress(_)));
    }

    #[tokio::test]
    async fn stream_of_gzip_chunks() {
        let compressed = gzip(TEXT);
        let chunks: Vec<Result<Bytes, Error>> = compressed
            .chunks(5)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let body = decode_stream(stream::iter(chunks), ContentEncoding::Gzip);
        assert_eq!(&body.collect_bytes().await.unwrap()[..], TEXT);
    }

    #[tokio::test]
    async fn stream_decode_error() {
        let chunks: Vec<Result<Bytes, Error>> =
            vec![Ok(Bytes::from_static(b"garbage that is not deflate at all"))];

        let body = decode_stream(stream::iter(chunks), ContentEncoding::Deflate);
        let err = body.collect_bytes().await.unwrap_err();
        assert!(matches!(err, Error::Decompress(_)));
    }
}
