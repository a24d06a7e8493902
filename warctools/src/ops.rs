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

//! Count, sample and extract operations over one or more WARC files.
//!
//! The `*_records` functions consume a single [`ArchiveReader`]. The file-level
//! functions open each input in order, run the stream function on it and
//! accumulate the results. All records retained from all inputs go to the same
//! [`ArchiveWriter`]. The first error aborts the whole run.

use std::io::{BufRead, Write};
use std::path::Path;

use rand::Rng;
use tracing::debug;

use crate::{ArchiveReader, ArchiveWriter, PatternMatcher, ReaderConfig, Result, WarcError};

/// Result of a sampling run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleStats {
    pub kept: u64,
    pub total: u64,
}

/// Result of an extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub matched: u64,
    pub total: u64,
}

/// Count the records of a stream without reading their payloads.
pub fn count_records<R: BufRead>(reader: &mut ArchiveReader<R>) -> Result<u64> {
    let mut n = 0;
    while reader.next_record()?.is_some() {
        n += 1;
    }
    Ok(n)
}

/// Copy a Bernoulli sample of a stream's records into `writer`.
///
/// One value is drawn from `rng` per record, in `[0, 1)`. The record is kept if
/// the value is `<= ratio`. A ratio of `0` never keeps a record.
pub fn sample_records<R, G, W>(
    reader: &mut ArchiveReader<R>,
    ratio: f64,
    rng: &mut G,
    writer: &mut ArchiveWriter<W>,
) -> Result<SampleStats>
where
    R: BufRead,
    G: Rng + ?Sized,
    W: Write,
{
    let mut stats = SampleStats::default();
    while let Some(mut record) = reader.next_record()? {
        stats.total += 1;
        let draw: f64 = rng.gen();
        if ratio > 0.0 && draw <= ratio {
            writer.write_record(&mut record)?;
            stats.kept += 1;
        }
    }
    Ok(stats)
}

/// Copy the records whose `field` header is matched by `matcher` into `writer`.
pub fn extract_records<R, W>(
    reader: &mut ArchiveReader<R>,
    field: &str,
    matcher: &PatternMatcher,
    writer: &mut ArchiveWriter<W>,
) -> Result<ExtractStats>
where
    R: BufRead,
    W: Write,
{
    let mut stats = ExtractStats::default();
    while let Some(mut record) = reader.next_record()? {
        stats.total += 1;
        if matcher.matches(field, record.headers()) {
            writer.write_record(&mut record)?;
            stats.matched += 1;
        }
    }
    Ok(stats)
}

/// Total number of records in all `inputs`.
pub fn count<P: AsRef<Path>>(inputs: &[P], config: &ReaderConfig) -> Result<u64> {
    let mut total = 0;
    for input in inputs {
        let n = with_input(input.as_ref(), config, count_records)?;
        debug!(input = %input.as_ref().display(), records = n, "counted input");
        total += n;
    }
    Ok(total)
}

/// Sample the records of all `inputs` into a single `writer`.
pub fn sample<P, G, W>(
    inputs: &[P],
    ratio: f64,
    rng: &mut G,
    writer: &mut ArchiveWriter<W>,
    config: &ReaderConfig,
) -> Result<SampleStats>
where
    P: AsRef<Path>,
    G: Rng + ?Sized,
    W: Write,
{
    if !(0.0..=1.0).contains(&ratio) {
        return Err(WarcError::InvalidRatio(ratio));
    }

    let mut stats = SampleStats::default();
    for input in inputs {
        let s = with_input(input.as_ref(), config, |reader| sample_records(reader, ratio, rng, writer))?;
        debug!(input = %input.as_ref().display(), kept = s.kept, records = s.total, "sampled input");
        stats.kept += s.kept;
        stats.total += s.total;
    }
    Ok(stats)
}

/// Extract the matching records of all `inputs` into a single `writer`.
///
/// The returned match count covers all inputs.
pub fn extract<P, W>(
    inputs: &[P],
    field: &str,
    matcher: &PatternMatcher,
    writer: &mut ArchiveWriter<W>,
    config: &ReaderConfig,
) -> Result<ExtractStats>
where
    P: AsRef<Path>,
    W: Write,
{
    let mut stats = ExtractStats::default();
    for input in inputs {
        let s = with_input(input.as_ref(), config, |reader| extract_records(reader, field, matcher, writer))?;
        debug!(input = %input.as_ref().display(), matched = s.matched, records = s.total, "extracted input");
        stats.matched += s.matched;
        stats.total += s.total;
    }
    Ok(stats)
}

/// Open `path`, run `f` on it and close it again, attaching the path to errors.
fn with_input<T, F>(path: &Path, config: &ReaderConfig, f: F) -> Result<T>
where
    F: FnOnce(&mut ArchiveReader<Box<dyn BufRead>>) -> Result<T>,
{
    ArchiveReader::open(path, config.clone())
        .and_then(|mut reader| f(&mut reader))
        .map_err(|e| WarcError::Input { path: path.to_path_buf(), source: Box::new(e) })
}
