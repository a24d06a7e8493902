// Copyright 2025 Janek Bevendorff
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Streaming WARC record reader.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::bufread::MultiGzDecoder;
use tracing::trace;

use crate::{HeaderEncoding, HeaderMap, Result, WarcError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub(crate) const BOUNDARY: &[u8; 4] = b"\r\n\r\n";

/// Archive reader configuration.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Enforce `CRLF` line endings in header blocks, setting this to `false` will allow plain `LF` also
    pub strict_mode: bool,
    /// Maximum size of a single header block in bytes
    pub max_header_size: usize,
    /// Encoding used to decode header keys and values
    pub header_encoding: HeaderEncoding,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            strict_mode: true,
            max_header_size: 1024 * 1024,
            header_encoding: HeaderEncoding::Unicode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Payload,
    Done,
}

/// Forward-only WARC record stream.
///
/// Records borrow the reader, so only one record can be alive at a time.
/// Payload bytes a record leaves unread are skipped on the next call to
/// [`ArchiveReader::next_record`]. After the first error the reader yields
/// no more records.
pub struct ArchiveReader<R> {
    reader: R,
    config: ReaderConfig,
    state: State,
    remaining: u64,
    pos: u64,
    records_read: u64,
}

impl ArchiveReader<Box<dyn BufRead>> {
    /// Open a WARC file, transparently decompressing it if it is gzipped.
    ///
    /// Multi-member gzip files (one member per record, as written by
    /// [`crate::ArchiveWriter`]) decode as a single stream.
    pub fn open<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        let mut file = BufReader::new(File::open(path)?);
        let reader: Box<dyn BufRead> = if file.fill_buf()?.starts_with(&GZIP_MAGIC) {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(file)
        };
        Ok(Self::new(reader, config))
    }
}

impl<R: BufRead> ArchiveReader<R> {
    /// Create a reader on an uncompressed WARC stream.
    ///
    /// # Arguments
    ///
    /// * `reader` - Input stream
    /// * `config` - Reader configuration
    pub fn new(reader: R, config: ReaderConfig) -> Self {
        ArchiveReader {
            reader,
            config,
            state: State::Header,
            remaining: 0,
            pos: 0,
            records_read: 0,
        }
    }

    /// Number of records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Current offset in the (uncompressed) input stream.
    pub fn stream_pos(&self) -> u64 {
        self.pos
    }

    /// Advance to the next record.
    ///
    /// # Returns
    ///
    /// `Ok(Some(record))` if a record was read, `Ok(None)` at the end of the stream
    /// (or after a previous error), or the decode error.
    pub fn next_record(&mut self) -> Result<Option<Record<'_, R>>> {
        let (headers, content_length, stream_pos) = match self.advance() {
            Ok(Some(next)) => next,
            Ok(None) => {
                self.state = State::Done;
                return Ok(None);
            }
            Err(e) => {
                self.state = State::Done;
                return Err(e);
            }
        };

        Ok(Some(Record {
            headers,
            content_length,
            stream_pos,
            payload: Payload {
                reader: &mut self.reader,
                remaining: &mut self.remaining,
                pos: &mut self.pos,
            },
        }))
    }

    fn advance(&mut self) -> Result<Option<(HeaderMap, u64, u64)>> {
        match self.state {
            State::Done => return Ok(None),
            State::Payload => {
                self.skip_payload()?;
                self.read_boundary()?;
                self.state = State::Header;
            }
            State::Header => {}
        }

        let start = self.pos;
        let raw = match self.read_header_block()? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let headers = HeaderMap::parse_at(raw, self.config.header_encoding, start)?;

        let content_length = match headers.get_bytes("Content-Length") {
            None => return Err(WarcError::MissingContentLength { offset: start }),
            Some(value) => std::str::from_utf8(value)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| WarcError::InvalidContentLength {
                    offset: start,
                    value: String::from_utf8_lossy(value).into_owned(),
                })?,
        };

        trace!(offset = start, content_length, "read record header");

        self.remaining = content_length;
        self.state = State::Payload;
        self.records_read += 1;
        Ok(Some((headers, content_length, start)))
    }

    /// Read the header block through the terminating empty line.
    /// Returns `None` if the stream ends cleanly before the first byte.
    fn read_header_block(&mut self) -> Result<Option<Vec<u8>>> {
        let start = self.pos;
        let limit = self.config.max_header_size;
        let mut raw = Vec::with_capacity(1024);

        for line_no in 1.. {
            let line_start = raw.len();
            if line_start >= limit {
                return Err(WarcError::HeaderTooLarge { offset: start, limit });
            }
            let budget = (limit - line_start) as u64;
            let n = (&mut self.reader).take(budget).read_until(b'\n', &mut raw)?;
            self.pos += n as u64;

            if n == 0 && line_start == 0 {
                return Ok(None);
            }
            let line = &raw[line_start..];
            if !line.ends_with(b"\n") {
                if raw.len() >= limit {
                    return Err(WarcError::HeaderTooLarge { offset: start, limit });
                }
                return Err(WarcError::UnexpectedEof { offset: self.pos, context: "header block" });
            }
            if self.config.strict_mode && !line.ends_with(b"\r\n") {
                return Err(WarcError::MalformedHeader {
                    offset: start + line_start as u64,
                    line: line_no,
                    content: String::from_utf8_lossy(line.trim_ascii_end()).into_owned(),
                });
            }

            if line_no == 1 {
                if !(line.starts_with(b"WARC/1.") || line.starts_with(b"WARC/0.")) {
                    return Err(WarcError::MissingStartLine {
                        offset: start,
                        found: String::from_utf8_lossy(line.trim_ascii_end()).into_owned(),
                    });
                }
            } else if line == b"\r\n" || line == b"\n" {
                break;
            }
        }

        Ok(Some(raw))
    }

    fn skip_payload(&mut self) -> Result<()> {
        while self.remaining > 0 {
            let available = self.reader.fill_buf()?.len();
            if available == 0 {
                return Err(WarcError::UnexpectedEof { offset: self.pos, context: "record payload" });
            }
            let n = available.min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
            self.reader.consume(n);
            self.remaining -= n as u64;
            self.pos += n as u64;
        }
        Ok(())
    }

    fn read_boundary(&mut self) -> Result<()> {
        let offset = self.pos;
        let mut found = [0u8; 4];
        match self.reader.read_exact(&mut found) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(WarcError::UnexpectedEof { offset, context: "record boundary" });
            }
            Err(e) => return Err(e.into()),
        }
        self.pos += found.len() as u64;
        if &found != BOUNDARY {
            return Err(WarcError::BadBoundary { offset, found: found.to_vec() });
        }
        Ok(())
    }
}


/// A WARC record borrowed from an [`ArchiveReader`].
pub struct Record<'a, R> {
    headers: HeaderMap,
    content_length: u64,
    stream_pos: u64,
    payload: Payload<'a, R>,
}

impl<'a, R: BufRead> Record<'a, R> {
    /// WARC record headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Declared `Content-Length` of the record payload.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Record start offset in the (uncompressed) input stream.
    pub fn stream_pos(&self) -> u64 {
        self.stream_pos
    }

    /// Record payload stream.
    pub fn payload(&mut self) -> &mut Payload<'a, R> {
        &mut self.payload
    }

    /// Borrow headers and payload stream at the same time.
    pub fn split(&mut self) -> (&HeaderMap, &mut Payload<'a, R>) {
        (&self.headers, &mut self.payload)
    }
}

/// Payload of the current record, yielding exactly `Content-Length` bytes.
///
/// Reads fail with [`io::ErrorKind::UnexpectedEof`] if the input ends before
/// the declared length is reached.
pub struct Payload<'a, R> {
    reader: &'a mut R,
    remaining: &'a mut u64,
    pos: &'a mut u64,
}

impl<R> Payload<'_, R> {
    /// Payload bytes not read yet.
    pub fn remaining(&self) -> u64 {
        *self.remaining
    }
}

impl<R: BufRead> Read for Payload<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(*self.remaining).unwrap_or(usize::MAX));
        let n = self.reader.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload truncated at offset {}, {} bytes missing", self.pos, self.remaining),
            ));
        }
        *self.remaining -= n as u64;
        *self.pos += n as u64;
        Ok(n)
    }
}
