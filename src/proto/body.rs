use std::io::Write;

use http::{header, HeaderMap, Method};

use super::ext::HeaderIterExt;
use super::util::{find_crlf, Writer};
use crate::Error;

/// Longest chunk size line (including extensions) we accept.
const MAX_CHUNK_LINE: usize = 1024;

/// How the body of a message is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body, e.g. a response to HEAD or a 204.
    NoBody,
    /// `content-length` delimited body.
    LengthDelimited(u64),
    /// `transfer-encoding: chunked`.
    Chunked,
    /// Body ends when the server closes the connection.
    CloseDelimited,
}

/// Request body writer.
///
/// The request body is always fully known before sending, so there is no
/// chunked variant here.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum BodyWriter {
    #[default]
    NoBody,
    LengthDelimited(u64),
}

impl BodyWriter {
    pub fn new_none() -> Self {
        BodyWriter::NoBody
    }

    pub fn new_delimited(len: u64) -> Self {
        BodyWriter::LengthDelimited(len)
    }

    pub fn has_body(&self) -> bool {
        matches!(self, BodyWriter::LengthDelimited(_))
    }

    pub fn is_ended(&self) -> bool {
        match self {
            BodyWriter::NoBody => true,
            BodyWriter::LengthDelimited(left) => *left == 0,
        }
    }

    pub fn left_to_send(&self) -> Option<u64> {
        match self {
            BodyWriter::NoBody => None,
            BodyWriter::LengthDelimited(left) => Some(*left),
        }
    }

    pub fn write(&mut self, input: &[u8], w: &mut Writer) -> usize {
        let BodyWriter::LengthDelimited(left) = self else {
            return 0;
        };

        let n = (input.len() as u64).min(*left).min(w.available() as u64) as usize;

        if w.try_write(|w| w.write_all(&input[..n])) {
            *left -= n as u64;
            n
        } else {
            0
        }
    }

    pub fn consume_direct_write(&mut self, amount: usize) {
        if let BodyWriter::LengthDelimited(left) = self {
            *left -= amount as u64;
        }
    }
}

/// Response body reader, removing the transfer framing.
#[derive(Debug)]
pub(crate) enum BodyReader {
    NoBody,
    LengthDelimited(u64),
    Chunked(Dechunker),
    CloseDelimited,
}

impl BodyReader {
    pub fn for_response(
        http10: bool,
        method: &Method,
        status: u16,
        headers: &HeaderMap,
    ) -> Result<Self, Error> {
        let is_success = (200..300).contains(&status);
        let no_body = method == Method::HEAD
            || (100..200).contains(&status)
            || status == 204
            || status == 304
            || (method == Method::CONNECT && is_success);

        if no_body {
            return Ok(BodyReader::NoBody);
        }

        if !http10 && headers.iter().has(header::TRANSFER_ENCODING, "chunked") {
            return Ok(BodyReader::Chunked(Dechunker::default()));
        }

        let mut lengths = headers.get_all(header::CONTENT_LENGTH).iter();

        if let Some(value) = lengths.next() {
            if lengths.next().is_some() {
                return Err(Error::TooManyContentLengthHeaders);
            }
            let len = parse_content_length(value.as_bytes())?;
            return Ok(BodyReader::LengthDelimited(len));
        }

        Ok(BodyReader::CloseDelimited)
    }

    pub fn read(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize), Error> {
        match self {
            BodyReader::NoBody => Ok((0, 0)),
            BodyReader::LengthDelimited(left) => {
                let n = (input.len().min(output.len()) as u64).min(*left) as usize;
                output[..n].copy_from_slice(&input[..n]);
                *left -= n as u64;
                Ok((n, n))
            }
            BodyReader::Chunked(dechunker) => dechunker.read(input, output),
            BodyReader::CloseDelimited => {
                let n = input.len().min(output.len());
                output[..n].copy_from_slice(&input[..n]);
                Ok((n, n))
            }
        }
    }

    pub fn is_ended(&self) -> bool {
        match self {
            BodyReader::NoBody => true,
            BodyReader::LengthDelimited(left) => *left == 0,
            BodyReader::Chunked(dechunker) => dechunker.is_ended(),
            BodyReader::CloseDelimited => false,
        }
    }

    pub fn body_mode(&self) -> BodyMode {
        match self {
            BodyReader::NoBody => BodyMode::NoBody,
            BodyReader::LengthDelimited(v) => BodyMode::LengthDelimited(*v),
            BodyReader::Chunked(_) => BodyMode::Chunked,
            BodyReader::CloseDelimited => BodyMode::CloseDelimited,
        }
    }
}

pub(crate) fn parse_content_length(value: &[u8]) -> Result<u64, Error> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or(Error::BadContentLengthHeader)
}

#[derive(Debug, Default)]
pub(crate) struct Dechunker {
    state: ChunkState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ChunkState {
    #[default]
    Size,
    Data(u64),
    DataCrLf,
    Trailer,
    Ended,
}

impl Dechunker {
    pub fn is_ended(&self) -> bool {
        self.state == ChunkState::Ended
    }

    /// The result `(usize, usize)` is `(input consumed, output used)`.
    pub fn read(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize), Error> {
        let mut input_used = 0;
        let mut output_used = 0;

        loop {
            let rest = &input[input_used..];

            match self.state {
                ChunkState::Size => {
                    let Some(line_len) = find_crlf(rest) else {
                        if rest.len() > MAX_CHUNK_LINE {
                            return Err(Error::ChunkLenNotANumber);
                        }
                        break;
                    };

                    let size = parse_chunk_size(&rest[..line_len])?;
                    input_used += line_len + 2;

                    self.state = if size == 0 {
                        ChunkState::Trailer
                    } else {
                        ChunkState::Data(size)
                    };
                }

                ChunkState::Data(left) => {
                    let n = (left.min(rest.len() as u64) as usize).min(output.len() - output_used);
                    if n == 0 {
                        break;
                    }

                    output[output_used..output_used + n].copy_from_slice(&rest[..n]);
                    input_used += n;
                    output_used += n;

                    let left = left - n as u64;
                    self.state = if left == 0 {
                        ChunkState::DataCrLf
                    } else {
                        ChunkState::Data(left)
                    };
                }

                ChunkState::DataCrLf => {
                    if rest.len() < 2 {
                        if rest.first().is_some_and(|b| *b != b'\r') {
                            return Err(Error::ChunkExpectedCrLf);
                        }
                        break;
                    }

                    if &rest[..2] != b"\r\n" {
                        return Err(Error::ChunkExpectedCrLf);
                    }

                    input_used += 2;
                    self.state = ChunkState::Size;
                }

                ChunkState::Trailer => {
                    // Trailers are read and discarded.
                    let Some(line_len) = find_crlf(rest) else {
                        break;
                    };

                    input_used += line_len + 2;

                    if line_len == 0 {
                        self.state = ChunkState::Ended;
                    }
                }

                ChunkState::Ended => break,
            }
        }

        Ok((input_used, output_used))
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, Error> {
    if !line.is_ascii() {
        return Err(Error::ChunkLenNotAscii);
    }

    let line = std::str::from_utf8(line).map_err(|_| Error::ChunkLenNotAscii)?;

    // Chunk extensions are ignored.
    let size = line.split(';').next().unwrap_or_default().trim();

    u64::from_str_radix(size, 16).map_err(|_| Error::ChunkLenNotANumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dechunk_all(input: &[u8], step: usize) -> (Vec<u8>, bool) {
        let mut d = Dechunker::default();
        let mut out = Vec::new();
        let mut buf = [0_u8; 3];
        let mut pending: Vec<u8> = Vec::new();

        for part in input.chunks(step) {
            pending.extend_from_slice(part);
            loop {
                let (i, o) = d.read(&pending, &mut buf).unwrap();
                pending.drain(..i);
                out.extend_from_slice(&buf[..o]);
                if i == 0 && o == 0 {
                    break;
                }
            }
        }

        (out, d.is_ended())
    }

    #[test]
    fn dechunk_whole_input() {
        let input = b"5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\n\r\n";
        let (out, ended) = dechunk_all(input, input.len());
        assert_eq!(out, b"hello world");
        assert!(ended);
    }

    #[test]
    fn dechunk_byte_by_byte() {
        let input = b"a\r\n0123456789\r\n0\r\nx-trailer: yes\r\n\r\n";
        let (out, ended) = dechunk_all(input, 1);
        assert_eq!(out, b"0123456789");
        assert!(ended);
    }

    #[test]
    fn dechunk_incomplete() {
        let (out, ended) = dechunk_all(b"5\r\nhel", 2);
        assert_eq!(out, b"hel");
        assert!(!ended);
    }

    #[test]
    fn length_delimited_reader_stops_at_length() {
        let mut r = BodyReader::LengthDelimited(3);
        let mut out = [0_u8; 10];
        let (i, o) = r.read(b"abcdef", &mut out).unwrap();
        assert_eq!((i, o), (3, 3));
        assert!(r.is_ended());
    }

    #[test]
    fn reader_for_response() {
        let mut headers = HeaderMap::new();
        let r = BodyReader::for_response(false, &Method::HEAD, 200, &headers).unwrap();
        assert_eq!(r.body_mode(), BodyMode::NoBody);

        let r = BodyReader::for_response(false, &Method::GET, 200, &headers).unwrap();
        assert_eq!(r.body_mode(), BodyMode::CloseDelimited);

        headers.insert(header::CONTENT_LENGTH, "12".parse().unwrap());
        let r = BodyReader::for_response(false, &Method::GET, 200, &headers).unwrap();
        assert_eq!(r.body_mode(), BodyMode::LengthDelimited(12));

        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        let r = BodyReader::for_response(false, &Method::GET, 200, &headers).unwrap();
        assert_eq!(r.body_mode(), BodyMode::Chunked);

        // HTTP/1.0 does not know chunked.
        let r = BodyReader::for_response(true, &Method::GET, 200, &headers).unwrap();
        assert_eq!(r.body_mode(), BodyMode::LengthDelimited(12));

        let r = BodyReader::for_response(false, &Method::GET, 304, &headers).unwrap();
        assert_eq!(r.body_mode(), BodyMode::NoBody);
    }

    #[test]
    fn writer_respects_length() {
        let mut writer = BodyWriter::new_delimited(4);
        let mut buf = [0_u8; 16];
        let mut w = Writer::new(&mut buf);
        assert_eq!(writer.write(b"abcdef", &mut w), 4);
        assert!(writer.is_ended());
        assert_eq!(writer.left_to_send(), Some(0));
    }
}
