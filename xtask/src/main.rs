//! Build automation tasks for mdt-ingest
//!
//! Currently one task: regenerating the CLI reference from the clap
//! definitions.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for mdt-ingest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<mdt_ingest::cli::Cli>();

    let content = format!(
        r#"# mdt-ingest CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

`mdt-ingest` polls the CIP API for interpretation requests, compares each
case against what the MDT database already holds, and writes new or changed
cases (family, proband, panels, genes, variants and report events) in one
transaction per case. Every run is recorded in the `list_update` table.

## Quick Start

```bash
# Apply migrations and ingest rare disease cases
mdt-ingest --sample-type raredisease --migrate

# Ingest one proband without writing anything
mdt-ingest --sample-type raredisease --sample P1001 --dry-run

# Replay saved case documents into an in-memory store
mdt-ingest --sample-type cancer --case-dir ./cases --memory-store
```

## Commands

{}

## Environment Variables

Read from the process environment or a `.env` file.

| Variable | Purpose |
|----------|---------|
| `CIP_API_URL` | CIP API base URL |
| `CIP_API_USERNAME`, `CIP_API_PASSWORD` | Token exchange credentials |
| `CIP_API_AUTH_SCHEME` | Authorization scheme (default `JWT`) |
| `CIP_API_TOKEN_TTL_SECS` | Token lifetime before re-authenticating |
| `CELLBASE_URL`, `CELLBASE_VERSION`, `CELLBASE_SPECIES` | Annotation service |
| `CELLBASE_CHUNK_SIZE` | Variants per annotation request |
| `PANELAPP_URL` | PanelApp web services |
| `LABKEY_URL`, `LABKEY_CONTAINERS` | Demographics lookup |
| `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` | PostgreSQL |
| `INGEST_HTTP_TIMEOUT_SECS`, `INGEST_MAX_RETRIES`, `INGEST_RETRY_BASE_DELAY_MS` | HTTP behaviour |
| `INGEST_TIER_THRESHOLD`, `INGEST_BATCH_SIZE`, `INGEST_EXOMISER_SCORE` | Pipeline tuning |
| `INGEST_ARCHIVE_DIR` | Where raw JSON of committed cases is written |
| `INGEST_EXCLUDED_SITES` | Comma-separated site codes never ingested |
| `RUST_LOG` | Log filter (e.g. `mdt_ingest=debug`) |

## Exit Status

`0` when the run finished, even if individual cases failed; `1` when the run
stopped on a fatal fault (authentication, listing, configuration).

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("CLI.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
