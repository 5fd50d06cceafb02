//! Command-line interface for `mdt-ingest`

use crate::orchestrator::RunOptions;
use clap::Parser;
use mdt_common::SampleType;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "mdt-ingest")]
#[command(author, version, about = "Ingest CIP interpretation requests into the MDT database")]
pub struct Cli {
    /// Programme to ingest: raredisease or cancer
    #[arg(long, env = "MDT_SAMPLE_TYPE")]
    pub sample_type: SampleType,

    /// Only ingest cases whose proband has this GEL participant id
    #[arg(long, value_name = "GEL_ID")]
    pub sample: Option<String>,

    /// Ingest at most this many cases, newest first
    #[arg(long, value_name = "N")]
    pub case_count: Option<usize>,

    /// Do not look up names, dates of birth or clinicians
    #[arg(long)]
    pub skip_demographics: bool,

    /// Also ingest tier 3 variants
    #[arg(long = "pullt3")]
    pub pull_t3: bool,

    /// Cases per annotation batch (overrides INGEST_BATCH_SIZE)
    #[arg(long, visible_alias = "bins", value_name = "N")]
    pub batch_size: Option<usize>,

    /// Roll back every case instead of committing it
    #[arg(long)]
    pub dry_run: bool,

    /// Keep everything in memory instead of writing to DATABASE_URL
    #[arg(long)]
    pub memory_store: bool,

    /// Run database migrations before ingesting
    #[arg(long)]
    pub migrate: bool,

    /// Read case documents from this directory instead of the CIP API
    #[arg(long, env = "MDT_CASE_DIR", value_name = "DIR")]
    pub case_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            sample_type: self.sample_type,
            sample: self.sample.clone(),
            case_count: self.case_count,
            skip_demographics: self.skip_demographics,
            pull_t3: self.pull_t3,
            batch_size: self.batch_size,
            dry_run: self.dry_run,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "mdt-ingest",
            "--sample-type",
            "cancer",
            "--case-count",
            "5",
            "--bins",
            "10",
            "--pullt3",
            "--dry-run",
        ])
        .unwrap();

        let options = cli.run_options();
        assert_eq!(options.sample_type, SampleType::Cancer);
        assert_eq!(options.case_count, Some(5));
        assert_eq!(options.batch_size, Some(10));
        assert!(options.pull_t3);
        assert!(options.dry_run);
        assert!(!options.skip_demographics);
    }

    #[test]
    fn test_invalid_sample_type_rejected() {
        assert!(Cli::try_parse_from(["mdt-ingest", "--sample-type", "germline"]).is_err());
    }
}
