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

//! warctools - CLI entry point

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use warctools::{
    ops, ArchiveWriter, Compression, HeaderEncoding, PatternMatcher, ReaderConfig, WarcError, WriterConfig,
};

#[derive(Parser)]
#[command(name = "warctools")]
#[command(about = "Count, sample and extract records of WARC files")]
#[command(version)]
struct Cli {
    /// Accept bare LF line endings in WARC header blocks
    #[arg(long, global = true)]
    lenient: bool,

    /// Decode header values as Latin-1 (Windows-1252) instead of UTF-8
    #[arg(long, global = true)]
    latin1: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample randomly selected records
    Sample {
        /// Fraction of the input records to be included [0, 1]
        #[arg(value_parser = parse_ratio)]
        ratio: f64,
        /// Output file (.warc.gz)
        output: PathBuf,
        /// Input files
        #[arg(required = true)]
        input: Vec<PathBuf>,
        /// Seed for the random generator (random if not given)
        #[arg(long)]
        seed: Option<u64>,
        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// Count the number of records in the files
    Count {
        /// Input files
        #[arg(required = true)]
        input: Vec<PathBuf>,
    },

    /// Extract records whose header value matches one of a list of expressions
    Extract {
        /// Name of the header
        header: String,
        /// File with the regular expressions to match the values, one per line
        values: PathBuf,
        /// Output file (.warc.gz)
        output: PathBuf,
        /// Input files
        #[arg(required = true)]
        input: Vec<PathBuf>,
        #[command(flatten)]
        output_args: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output compression
    #[arg(long, value_enum, default_value_t = CompressionArg::PerRecord)]
    compression: CompressionArg,
    /// Deflate level
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
    level: u32,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionArg {
    /// One gzip member per record
    PerRecord,
    /// Single gzip stream
    Stream,
    /// Uncompressed
    None,
}

impl From<OutputArgs> for WriterConfig {
    fn from(args: OutputArgs) -> Self {
        WriterConfig {
            compression: match args.compression {
                CompressionArg::PerRecord => Compression::PerRecord,
                CompressionArg::Stream => Compression::Stream,
                CompressionArg::None => Compression::None,
            },
            level: args.level,
        }
    }
}

fn parse_ratio(s: &str) -> std::result::Result<f64, String> {
    let ratio: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{ratio} is not in [0, 1]"))
    }
}

fn check_inputs(inputs: &[PathBuf]) -> Result<()> {
    for input in inputs {
        if !input.is_file() {
            bail!("Input file {} does not exist or is not a file", input.display());
        }
    }
    Ok(())
}

fn create_writer(output: &Path, args: OutputArgs) -> Result<ArchiveWriter<std::io::BufWriter<std::fs::File>>> {
    ArchiveWriter::create(output, args.into())
        .with_context(|| format!("Failed to create output file {}", output.display()))
}

fn describe(err: WarcError) -> anyhow::Error {
    if err.is_decode_error() {
        anyhow::Error::new(err).context("Corrupt WARC input")
    } else {
        err.into()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let reader_config = ReaderConfig {
        strict_mode: !cli.lenient,
        header_encoding: if cli.latin1 { HeaderEncoding::Latin1 } else { HeaderEncoding::Unicode },
        ..Default::default()
    };

    match cli.command {
        Commands::Count { input } => {
            check_inputs(&input)?;
            let n = ops::count(&input, &reader_config).map_err(describe)?;
            println!("{}", n);
        }

        Commands::Sample { ratio, output, input, seed, output_args } => {
            check_inputs(&input)?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut writer = create_writer(&output, output_args)?;
            let stats = ops::sample(&input, ratio, &mut rng, &mut writer, &reader_config).map_err(describe)?;
            writer.finish()?;
            eprintln!("{}/{} records written", stats.kept, stats.total);
        }

        Commands::Extract { header, values, output, input, output_args } => {
            check_inputs(&input)?;
            let matcher = PatternMatcher::load(&values)
                .with_context(|| format!("Failed to load patterns from {}", values.display()))?;
            let mut writer = create_writer(&output, output_args)?;
            let stats = ops::extract(&input, &header, &matcher, &mut writer, &reader_config).map_err(describe)?;
            writer.finish()?;
            eprintln!("{} records matched.", stats.matched);
        }
    }

    Ok(())
}
