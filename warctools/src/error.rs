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

//! Error types for reading, writing and filtering WARC streams.

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, WarcError>;

/// Fatal errors of the WARC codec and the stream operations.
///
/// None of these are recoverable: a decode error leaves the input stream at an
/// unknown position and an encode error leaves the output misaligned.
#[derive(Debug, thiserror::Error)]
pub enum WarcError {
    #[error("No WARC version line at offset {offset} (found {found:?})")]
    MissingStartLine { offset: u64, found: String },

    #[error("Malformed header line {line} of record at offset {offset}: {content:?}")]
    MalformedHeader { offset: u64, line: usize, content: String },

    #[error("Header block of record at offset {offset} exceeds {limit} bytes")]
    HeaderTooLarge { offset: u64, limit: usize },

    #[error("Record at offset {offset} has no Content-Length")]
    MissingContentLength { offset: u64 },

    #[error("Record at offset {offset} has invalid Content-Length {value:?}")]
    InvalidContentLength { offset: u64, value: String },

    #[error("Unexpected end of stream in {context} at offset {offset}")]
    UnexpectedEof { offset: u64, context: &'static str },

    #[error("Bad record boundary at offset {offset}: expected CRLF CRLF, found {found:?}")]
    BadBoundary { offset: u64, found: Vec<u8> },

    #[error("Short payload: expected {expected} bytes, got {actual}")]
    ShortPayload { expected: u64, actual: u64 },

    #[error("Invalid pattern on line {line} ({pattern:?}): {source}")]
    InvalidPattern {
        line: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cannot read pattern line {line}: {source}")]
    UnreadablePattern {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("Sampling ratio must be in [0, 1], got {0}")]
    InvalidRatio(f64),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to process {}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: Box<WarcError>,
    },
}

impl WarcError {
    /// Whether this error was caused by malformed or truncated input data.
    pub fn is_decode_error(&self) -> bool {
        if let WarcError::Input { source, .. } = self {
            return source.is_decode_error();
        }
        matches!(
            self,
            WarcError::MissingStartLine { .. }
                | WarcError::MalformedHeader { .. }
                | WarcError::HeaderTooLarge { .. }
                | WarcError::MissingContentLength { .. }
                | WarcError::InvalidContentLength { .. }
                | WarcError::UnexpectedEof { .. }
                | WarcError::BadBoundary { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_classified() {
        assert!(WarcError::BadBoundary { offset: 3, found: b"\r\nXX".to_vec() }.is_decode_error());
        assert!(WarcError::UnexpectedEof { offset: 0, context: "payload" }.is_decode_error());
        assert!(!WarcError::ShortPayload { expected: 5, actual: 3 }.is_decode_error());
        assert!(!WarcError::InvalidRatio(2.0).is_decode_error());

        let wrapped = WarcError::Input {
            path: PathBuf::from("a.warc.gz"),
            source: Box::new(WarcError::MissingContentLength { offset: 0 }),
        };
        assert!(wrapped.is_decode_error());
        assert_eq!(wrapped.to_string(), "Failed to process a.warc.gz");
    }

    #[test]
    fn messages_name_the_offset() {
        let err = WarcError::MissingContentLength { offset: 1234 };
        assert_eq!(err.to_string(), "Record at offset 1234 has no Content-Length");
    }
}
