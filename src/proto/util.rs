use std::io::{self, Cursor};

/// Incremental writer over a caller supplied output buffer.
///
/// Each `try_write` either fits entirely or leaves the buffer untouched, which
/// lets the prelude be written line by line into small buffers.
pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Writer<'a> {
        Writer { buf, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn try_write(&mut self, block: impl FnOnce(&mut Cursor<&mut [u8]>) -> io::Result<()>) -> bool {
        let mut cursor = Cursor::new(&mut self.buf[self.pos..]);

        if block(&mut cursor).is_ok() {
            self.pos += cursor.position() as usize;
            true
        } else {
            false
        }
    }
}

pub(crate) fn log_data(data: &[u8]) {
    if log_enabled!(log::Level::Trace) {
        for line in String::from_utf8_lossy(data).lines() {
            trace!("{}", line);
        }
    }
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn writer_all_or_nothing() {
        let mut buf = [0_u8; 8];
        let mut w = Writer::new(&mut buf);

        assert!(w.try_write(|w| w.write_all(b"hello")));
        assert_eq!(w.len(), 5);

        // Does not fit, position must not move.
        assert!(!w.try_write(|w| w.write_all(b"world")));
        assert_eq!(w.len(), 5);
        assert_eq!(w.available(), 3);

        assert!(w.try_write(|w| w.write_all(b"!!!")));
        assert_eq!(&buf, b"hello!!!");
    }

    #[test]
    fn crlf_position() {
        assert_eq!(find_crlf(b"abc\r\ndef"), Some(3));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"abc\r"), None);
    }
}
