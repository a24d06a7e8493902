//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

/// A framed WARC record with the given type, record ID and payload.
pub fn record(warc_type: &str, id: usize, payload: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "WARC/1.1\r\nWARC-Type: {}\r\nWARC-Record-ID: <urn:test:{}>\r\nX-Custom-Field: kept as is\r\nContent-Length: {}\r\n\r\n",
        warc_type,
        id,
        payload.len()
    )
    .into_bytes();
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n\r\n");
    out
}

/// An uncompressed archive with one record per entry of `types`.
pub fn archive(types: &[&str]) -> Vec<u8> {
    types
        .iter()
        .enumerate()
        .flat_map(|(i, t)| record(t, i, format!("payload of record {}", i).as_bytes()))
        .collect()
}

/// Write `data` gzipped as a single stream.
pub fn write_gz(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap();
    path
}

/// Write `data` uncompressed.
pub fn write_plain(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

/// Decompress all gzip members of a file.
pub fn gunzip(path: &Path) -> Vec<u8> {
    let mut out = Vec::new();
    MultiGzDecoder::new(fs::File::open(path).unwrap()).read_to_end(&mut out).unwrap();
    out
}
