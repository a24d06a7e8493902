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

//! Streaming WARC record writer.
//!
//! Records are written from their verbatim header bytes and a payload stream.
//! With [`Compression::PerRecord`] every record becomes its own gzip member, so
//! a record can be decompressed on its own given its file offset.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Read, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use tracing::debug;

use crate::reader::{Record, BOUNDARY};
use crate::{Result, WarcError};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Output compression mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// One gzip member per record
    #[default]
    PerRecord,
    /// The whole output is a single gzip stream
    Stream,
    /// Uncompressed output
    None,
}

/// Archive writer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Output compression mode
    pub compression: Compression,
    /// Deflate level (0-9)
    pub level: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            compression: Compression::PerRecord,
            level: 6,
        }
    }
}

enum Sink<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Appends framed WARC records to an output stream.
pub struct ArchiveWriter<W: Write> {
    sink: Sink<W>,
    config: WriterConfig,
    buf: Box<[u8]>,
    records_written: u64,
    payload_bytes: u64,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create (or truncate) an output file.
    pub fn create<P: AsRef<Path>>(path: P, config: WriterConfig) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?), config))
    }
}

impl<W: Write> ArchiveWriter<W> {
    /// Create a writer on an output stream.
    ///
    /// # Arguments
    ///
    /// * `writer` - Output stream
    /// * `config` - Writer configuration
    pub fn new(writer: W, config: WriterConfig) -> Self {
        let sink = match config.compression {
            Compression::Stream => Sink::Gzip(GzEncoder::new(writer, gzip_level(&config))),
            Compression::PerRecord | Compression::None => Sink::Plain(writer),
        };
        ArchiveWriter {
            sink,
            config,
            buf: vec![0u8; COPY_BUF_SIZE].into_boxed_slice(),
            records_written: 0,
            payload_bytes: 0,
        }
    }

    /// Writer configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Number of payload bytes written so far.
    pub fn payload_bytes_written(&self) -> u64 {
        self.payload_bytes
    }

    /// Write one record from its raw header block and payload stream.
    ///
    /// Exactly `content_length` bytes are copied from `payload`. If the stream
    /// ends early, [`WarcError::ShortPayload`] is returned and the output must
    /// be considered corrupt.
    ///
    /// # Arguments
    ///
    /// * `raw_header` - Header block including the terminating empty line
    /// * `content_length` - Number of payload bytes
    /// * `payload` - Payload stream
    pub fn write_raw<P: Read + ?Sized>(
        &mut self,
        raw_header: &[u8],
        content_length: u64,
        payload: &mut P,
    ) -> Result<()> {
        self.write_with(raw_header, content_length, payload, |actual| WarcError::ShortPayload {
            expected: content_length,
            actual,
        })
    }

    /// Copy a record from an [`crate::ArchiveReader`], header bytes unchanged.
    ///
    /// A payload that ends before `Content-Length` bytes is a truncated input
    /// and fails with [`WarcError::UnexpectedEof`] at the input offset where
    /// the data ran out.
    pub fn write_record<R: BufRead>(&mut self, record: &mut Record<'_, R>) -> Result<()> {
        let content_length = record.content_length();
        let payload_start = record.stream_pos() + record.headers().as_bytes().len() as u64;
        let (headers, payload) = record.split();
        self.write_with(headers.as_bytes(), content_length, payload, |copied| WarcError::UnexpectedEof {
            offset: payload_start + copied,
            context: "record payload",
        })
    }

    fn write_with<P, F>(&mut self, raw_header: &[u8], content_length: u64, payload: &mut P, short: F) -> Result<()>
    where
        P: Read + ?Sized,
        F: FnOnce(u64) -> WarcError,
    {
        match self.config.compression {
            Compression::PerRecord => {
                let level = gzip_level(&self.config);
                let mut member = GzEncoder::new(&mut self.sink, level);
                write_framed(&mut member, &mut self.buf, raw_header, content_length, payload, short)?;
                member.finish()?;
            }
            Compression::Stream | Compression::None => {
                write_framed(&mut self.sink, &mut self.buf, raw_header, content_length, payload, short)?;
            }
        }
        self.records_written += 1;
        self.payload_bytes += content_length;
        Ok(())
    }

    /// Finish the output and return the underlying stream.
    ///
    /// A per-record compressed archive without records still gets one empty
    /// gzip member, so it remains a valid gzip file.
    pub fn finish(self) -> Result<W> {
        let ArchiveWriter { mut sink, config, records_written, payload_bytes, .. } = self;
        if config.compression == Compression::PerRecord && records_written == 0 {
            GzEncoder::new(&mut sink, gzip_level(&config)).finish()?;
        }
        let mut inner = match sink {
            Sink::Plain(w) => w,
            Sink::Gzip(gz) => gz.finish()?,
        };
        inner.flush()?;
        debug!(records = records_written, payload_bytes, "finished archive");
        Ok(inner)
    }
}

fn gzip_level(config: &WriterConfig) -> flate2::Compression {
    flate2::Compression::new(config.level.min(9))
}

/// Write header, payload and boundary. If `payload` ends early, nothing more
/// is written and `short` turns the copied byte count into the error.
fn write_framed<W, P, F>(
    out: &mut W,
    buf: &mut [u8],
    raw_header: &[u8],
    content_length: u64,
    payload: &mut P,
    short: F,
) -> Result<()>
where
    W: Write,
    P: Read + ?Sized,
    F: FnOnce(u64) -> WarcError,
{
    out.write_all(raw_header)?;

    let mut copied = 0u64;
    while copied < content_length {
        let want = buf.len().min(usize::try_from(content_length - copied).unwrap_or(usize::MAX));
        let n = match payload.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        out.write_all(&buf[..n])?;
        copied += n as u64;
    }
    if copied < content_length {
        return Err(short(copied));
    }

    out.write_all(BOUNDARY)?;
    Ok(())
}
