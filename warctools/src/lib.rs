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

//! Streaming WARC record codec and the count / sample / extract operations
//! built on top of it.
//!
//! Records are never materialized as a whole: the [`ArchiveReader`] parses one
//! header block at a time and hands out a bounded payload stream, and the
//! [`ArchiveWriter`] copies that stream straight into the output next to the
//! verbatim header bytes.

use std::io;
use encoding::{Encoding, DecoderTrap};
use encoding::all::WINDOWS_1252;

mod error;
pub mod matcher;
pub mod ops;
pub mod reader;
pub mod writer;

pub use error::{Result, WarcError};
pub use matcher::PatternMatcher;
pub use reader::{ArchiveReader, Payload, ReaderConfig, Record};
pub use writer::{ArchiveWriter, Compression, WriterConfig};


#[derive(Debug, Eq, PartialEq, Clone, Copy, Default)]
pub enum HeaderEncoding {
    #[default]
    Unicode,
    Latin1
}

/// Dict-like view of a WARC header block.
///
/// The block is kept byte for byte as it was read. Parsed fields are only
/// used for lookups; writing a header block always emits the original bytes.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    encoding: HeaderEncoding,
    raw: Vec<u8>,
    status_line: Vec<u8>,
    headers: Vec<(Vec<u8>, Vec<u8>)>,
}

impl HeaderMap {
    /// Parse a raw header block.
    ///
    /// The block starts with the status line and ends with (or at) the first
    /// empty line. Both `CRLF` and bare `LF` terminators are accepted here;
    /// line ending policy is enforced by the reader.
    ///
    /// # Arguments
    ///
    /// * `raw` - Header block bytes
    /// * `encoding` - Encoding used to decode keys and values
    pub fn parse(raw: Vec<u8>, encoding: HeaderEncoding) -> Result<Self> {
        Self::parse_at(raw, encoding, 0)
    }

    /// Parse a raw header block located at `offset` in the input stream.
    pub(crate) fn parse_at(raw: Vec<u8>, encoding: HeaderEncoding, offset: u64) -> Result<Self> {
        let mut status_line = Vec::new();
        let mut headers: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(16);

        let mut pos = 0usize;
        for (line_no, line) in raw.split_inclusive(|&b| b == b'\n').enumerate() {
            let line_offset = pos;
            pos += line.len();
            let line = strip_line_ending(line);

            if line_no == 0 {
                status_line = line.to_vec();
                continue;
            }
            if line.is_empty() {
                break;
            }

            // Folded value
            if line[0] == b' ' || line[0] == b'\t' {
                match headers.last_mut() {
                    Some(last) => {
                        last.1.push(b' ');
                        last.1.extend_from_slice(line.trim_ascii());
                        continue;
                    }
                    None => {
                        return Err(malformed(offset + line_offset as u64, line_no, line, encoding));
                    }
                }
            }

            match line.iter().position(|&b| b == b':') {
                Some(colon) if colon > 0 => {
                    headers.push((line[..colon].trim_ascii().to_vec(), line[colon + 1..].trim_ascii().to_vec()));
                }
                _ => return Err(malformed(offset + line_offset as u64, line_no, line, encoding)),
            }
        }

        Ok(HeaderMap {
            encoding,
            raw,
            status_line,
            headers,
        })
    }

    /// Get the header encoding.
    pub fn encoding(&self) -> HeaderEncoding {
        self.encoding
    }

    /// Get the header status line (e.g. `WARC/1.1`).
    pub fn status_line(&self) -> String {
        decode(self.encoding, &self.status_line)
    }

    /// Get the raw status line as bytes.
    pub fn status_line_bytes(&self) -> &[u8] {
        &self.status_line
    }

    /// The verbatim header block, from the status line through the blank line.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Get value for (case-insensitive) header key as a string.
    /// Only the first occurrence of duplicate headers is returned.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get(&self, key: &str) -> Option<String> {
        Some(decode(self.encoding, self.get_bytes(key)?))
    }

    /// Get value for (case-insensitive) header key as bytes.
    /// Only the first occurrence of duplicate headers is returned.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        let key = key.as_bytes();
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
    }

    /// Check if a (case-insensitive) header key exists.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn contains_key(&self, key: &str) -> bool {
        self.get_bytes(key).is_some()
    }

    /// Iterator of keys and values, duplicates included, in block order.
    pub fn items(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.headers
            .iter()
            .map(|(k, v)| (decode(self.encoding, k), decode(self.encoding, v)))
    }

    /// Iterator of header keys.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.headers
            .iter()
            .map(|(k, _)| decode(self.encoding, k))
    }

    /// Iterator of header values.
    pub fn values(&self) -> impl Iterator<Item = String> + '_ {
        self.headers
            .iter()
            .map(|(_, v)| decode(self.encoding, v))
    }

    /// Get the number of headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if the header map is empty.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Write the verbatim header block into stream.
    pub fn write<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        writer.write_all(&self.raw)?;
        Ok(self.raw.len())
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn decode(encoding: HeaderEncoding, byte_str: &[u8]) -> String {
    match encoding {
        HeaderEncoding::Unicode => String::from_utf8_lossy(byte_str).into_owned(),
        HeaderEncoding::Latin1 => WINDOWS_1252.decode(byte_str, DecoderTrap::Replace)
            .unwrap_or_else(|_| String::new())
    }
}

fn malformed(offset: u64, line: usize, content: &[u8], encoding: HeaderEncoding) -> WarcError {
    WarcError::MalformedHeader {
        offset,
        line: line + 1,
        content: decode(encoding, content),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn block(s: &str) -> HeaderMap {
        HeaderMap::parse(s.as_bytes().to_vec(), HeaderEncoding::Unicode).unwrap()
    }

    #[test]
    fn parses_fields_in_order() {
        let headers = block("WARC/1.1\r\nWARC-Type: response\r\nContent-Length: 12\r\nX-Custom:  spaced value \r\n\r\n");
        assert_eq!(headers.status_line(), "WARC/1.1");
        assert_eq!(headers.status_line_bytes(), b"WARC/1.1");
        assert_eq!(headers.len(), 3);
        assert!(!headers.is_empty());
        assert_eq!(
            headers.items().next(),
            Some(("WARC-Type".to_string(), "response".to_string()))
        );
        assert_eq!(
            headers.keys().collect::<Vec<_>>(),
            vec!["WARC-Type", "Content-Length", "X-Custom"]
        );
        assert_eq!(headers.get("x-custom").as_deref(), Some("spaced value"));
    }

    #[test]
    fn lookup_is_case_insensitive_and_returns_first_duplicate() {
        let headers = block("WARC/1.0\r\nwarc-type: request\r\nWARC-TYPE: response\r\n\r\n");
        assert_eq!(headers.get("WARC-Type").as_deref(), Some("request"));
        assert_eq!(headers.get_bytes("Warc-Type"), Some(&b"request"[..]));
        assert_eq!(headers.values().collect::<Vec<_>>(), vec!["request", "response"]);
        assert!(headers.contains_key("WARC-type"));
        assert!(!headers.contains_key("Content-Length"));
    }

    #[test]
    fn raw_bytes_are_untouched() {
        let raw = "WARC/1.0\r\nX-Odd-Case:value\r\nx-odd-case :  other\r\n\r\n";
        let headers = block(raw);
        assert_eq!(headers.as_bytes(), raw.as_bytes());

        let mut out = Vec::new();
        assert_eq!(headers.write(&mut out).unwrap(), raw.len());
        assert_eq!(out, raw.as_bytes());
    }

    #[test]
    fn folded_values_are_joined() {
        let headers = block("WARC/1.1\r\nWARC-Warcinfo: first\r\n  second\r\n\tthird\r\n\r\n");
        assert_eq!(headers.get("WARC-Warcinfo").as_deref(), Some("first second third"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn empty_values_are_allowed() {
        let headers = block("WARC/1.1\r\nX-Empty:\r\n\r\n");
        assert_eq!(headers.get("X-Empty").as_deref(), Some(""));
    }

    #[test]
    fn line_without_colon_is_malformed() {
        let raw = b"WARC/1.1\r\nWARC-Type: response\r\nbroken line\r\n\r\n".to_vec();
        match HeaderMap::parse_at(raw, HeaderEncoding::Unicode, 100) {
            Err(WarcError::MalformedHeader { offset, line, content }) => {
                assert_eq!(offset, 100 + 31);
                assert_eq!(line, 3);
                assert_eq!(content, "broken line");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn leading_continuation_is_malformed() {
        let raw = b"WARC/1.1\r\n continued\r\n\r\n".to_vec();
        assert!(matches!(
            HeaderMap::parse(raw, HeaderEncoding::Unicode),
            Err(WarcError::MalformedHeader { line: 2, .. })
        ));
    }

    #[test]
    fn latin1_values_are_decoded() {
        let raw = b"WARC/1.0\r\nX-Name: caf\xe9\r\n\r\n".to_vec();
        let headers = HeaderMap::parse(raw.clone(), HeaderEncoding::Latin1).unwrap();
        assert_eq!(headers.encoding(), HeaderEncoding::Latin1);
        assert_eq!(headers.get("X-Name").as_deref(), Some("café"));

        let headers = HeaderMap::parse(raw, HeaderEncoding::Unicode).unwrap();
        assert_eq!(headers.get("X-Name").as_deref(), Some("caf\u{fffd}"));
    }
}
