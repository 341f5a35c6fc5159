use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Normalize survey sheet values and measure cleaning impact",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the normalization pipeline over one version directory of sheets
    Clean(CleanArgs),
    /// Diff raw/manual/auto sheet versions and report edit statistics
    Impact(ImpactArgs),
    /// Check location columns against the canonical reference sets
    Validate(ValidateArgs),
    /// Build the shared location maps without running the pipeline
    Maps(MapsArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Directory holding the input sheet CSVs
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Directory to write cleaned sheet CSVs (in-memory dry run if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Directory holding persisted correction maps
    #[arg(short = 'm', long = "maps")]
    pub maps: PathBuf,
    /// Frequency dictionary file with one `term count` pair per line
    #[arg(short = 'd', long = "dictionary")]
    pub dictionary: PathBuf,
    /// Pipeline configuration YAML (defaults to the built-in pipeline)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Override the fuzzy-correction acceptance threshold
    #[arg(long)]
    pub threshold: Option<u64>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ImpactArgs {
    /// Directory holding the raw capture sheets
    #[arg(long = "raw")]
    pub raw: PathBuf,
    /// Directory holding the manually corrected sheets
    #[arg(long = "manual")]
    pub manual: PathBuf,
    /// Directory holding the pipeline-cleaned sheets
    #[arg(long = "auto")]
    pub auto: PathBuf,
    /// Pipeline configuration YAML (defaults to the built-in pipeline)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Lower outlier threshold as a percentage
    #[arg(long, default_value_t = 1.0)]
    pub low: f64,
    /// Upper outlier threshold as a percentage
    #[arg(long, default_value_t = 100.0)]
    pub high: f64,
    /// Write the between-thresholds ranking as a JSON side artifact
    #[arg(long = "chart-data")]
    pub chart_data: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Directory holding the sheet CSVs to validate
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Version label used in discrepancy artifact names (e.g. raw, manual)
    #[arg(long = "version")]
    pub version: String,
    /// Directory holding the canonical reference sets
    #[arg(short = 'r', long = "references")]
    pub references: PathBuf,
    /// Directory to write discrepancy artifacts
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Pipeline configuration YAML (defaults to the built-in pipeline)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MapsArgs {
    /// Directory holding the sheet CSVs to seed the maps from
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Directory to write the location maps
    #[arg(short = 'm', long = "maps")]
    pub maps: PathBuf,
    /// Pipeline configuration YAML (defaults to the built-in pipeline)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
