//! txtpack-decode
//!
//! Rebuild a project directory from a text archive and verify it.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use emx_txtpack::cli::{init_tracing, print_block};
use emx_txtpack::config::DEFAULT_CONFIG_FILE;
use emx_txtpack::{prepare_destination, Config, Outcome, Unpacker};

#[derive(Parser, Debug)]
#[command(name = "txtpack-decode")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Rebuild a project directory from a text archive")]
struct Cli {
    /// Archive file to read (default from config: encoded_project.txt)
    source_file: Option<PathBuf>,

    /// Directory to rebuild into (default from config: decoded_project)
    output_dir: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Start verification without waiting for Enter
    #[arg(short, long)]
    yes: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?
        .decode;
    let source_file = cli.source_file.unwrap_or(config.source_file);
    let output_dir = cli.output_dir.unwrap_or(config.output_dir);

    print_block(
        "Configuration",
        &[
            ("Source file", source_file.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Back up existing files", if config.backup { "yes" } else { "no" }.to_string()),
        ],
    );

    if !source_file.is_file() {
        anyhow::bail!("Source file not found: {}", source_file.display());
    }

    if let Some(backup) = prepare_destination(&output_dir, config.backup)? {
        println!("Backed up existing files to: {}", backup.display());
    }

    let unpacker = Unpacker::new(&output_dir);
    let report = unpacker
        .unpack_file(&source_file)
        .with_context(|| format!("Failed to unpack: {}", source_file.display()))?;

    println!();
    for failure in &report.failures {
        println!("[error] {failure}");
    }
    print_block(
        "Decoding complete",
        &[
            ("Files restored", report.written.len().to_string()),
            ("Errors", report.errors().to_string()),
            ("Output directory", output_dir.display().to_string()),
        ],
    );

    if !cli.yes {
        println!("Press Enter to start integrity verification...");
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
    }

    let verification = unpacker.verify(&report.expectations);
    for result in &verification.results {
        println!("[verify] {}", result.path);
        match &result.outcome {
            Outcome::Matched => println!("   └─ [ok] hash matched"),
            Outcome::HashMismatch { expected, actual } => {
                println!("   └─ [failed] hash mismatch!");
                println!("      ├─ expected: {expected}");
                println!("      └─ actual:   {actual}");
            }
            other => println!("   └─ [failed] {other}"),
        }
    }

    println!();
    print_block(
        "Verification complete",
        &[
            ("Files checked", verification.total().to_string()),
            ("Matched", verification.matched().to_string()),
            ("Failed", verification.failed().to_string()),
        ],
    );

    Ok(if verification.failed() == 0 && report.errors() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
