//! txtpack-encode
//!
//! Pack a project directory into a single text archive.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use emx_txtpack::cli::{init_tracing, print_block};
use emx_txtpack::config::DEFAULT_CONFIG_FILE;
use emx_txtpack::{Config, Discovery, Encoder, Packer};

#[derive(Parser, Debug)]
#[command(name = "txtpack-encode")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Pack a project directory into one text archive")]
struct Cli {
    /// Project directory to pack (default from config: ".")
    target_dir: Option<PathBuf>,

    /// Archive file to write (default from config: encoded_project.txt)
    output_file: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?
        .encode;
    let target_dir = cli.target_dir.unwrap_or(config.target_dir);
    let output_file = cli.output_file.unwrap_or(config.output_file);

    print_block(
        "Configuration",
        &[
            ("Target directory", target_dir.display().to_string()),
            ("Output file", output_file.display().to_string()),
            ("File types", config.file_types.join(", ")),
            ("Excluded directories", config.exclude_dirs.join(", ")),
        ],
    );

    let discovery = Discovery::new(&config.file_types, &config.exclude_dirs);
    let candidates = discovery.discover(&target_dir);

    let packer = Packer::new(&target_dir)
        .with_encoder(Encoder::new().with_marker_escaping(config.escape_marker_lines));
    let report = packer
        .pack_to_file(candidates, &output_file)
        .with_context(|| format!("Failed to pack: {}", target_dir.display()))?;

    println!();
    print_block(
        "Done",
        &[
            ("Files written", report.written().to_string()),
            ("Errors", report.errors().to_string()),
            ("Archive", output_file.display().to_string()),
        ],
    );

    Ok(if report.errors() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
