use bytes::{Buf, BytesMut};
use memchr::memchr;
use std::io;
use tokio_util::codec::Decoder;

/// Splits a byte stream into physical rows and transcodes each one to UTF-8.
///
/// The line terminator (`\n` or `\r\n`) is stripped. Rows are framed on the
/// `\n` byte, so the charset must be ASCII-compatible.
pub struct RowCodec {
    charset: &'static encoding_rs::Encoding,
    max_row_bytes: usize,
    // Offset already scanned for a line break, so a partial row is not rescanned.
    next_index: usize,
    // A byte order mark is only honored at the start of the stream
    first_row: bool,
}

impl RowCodec {
    pub fn new(charset: &'static encoding_rs::Encoding, max_row_bytes: usize) -> Self {
        Self {
            charset,
            max_row_bytes,
            next_index: 0,
            first_row: true,
        }
    }

    fn transcode(&mut self, row: &[u8]) -> String {
        let row = row.strip_suffix(b"\n").unwrap_or(row);
        let row = row.strip_suffix(b"\r").unwrap_or(row);
        let (text, _had_errors) = if std::mem::take(&mut self.first_row) {
            self.charset.decode_with_bom_removal(row)
        } else {
            self.charset.decode_without_bom_handling(row)
        };
        text.into_owned()
    }
}

impl Decoder for RowCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let start = self.next_index.min(src.len());

        match memchr(b'\n', &src[start..]) {
            Some(offset) => {
                let end = start + offset + 1;
                let row = self.transcode(&src[..end]);
                src.advance(end);
                self.next_index = 0;
                Ok(Some(row))
            }
            None if src.len() > self.max_row_bytes => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("row exceeds the maximum length of {} bytes", self.max_row_bytes),
            )),
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(row) = self.decode(buf)? {
            return Ok(Some(row));
        }

        self.next_index = 0;
        if buf.is_empty() {
            return Ok(None);
        }

        // Last row without a trailing line break
        let row = self.transcode(&buf[..]);
        buf.clear();
        Ok(Some(row))
    }
}
