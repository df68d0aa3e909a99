//! Shared command-line plumbing

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins; otherwise `info`, or
/// `debug` when verbose.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Print a titled block of `label: value` lines
pub fn print_block(title: &str, rows: &[(&str, String)]) {
    println!("========== {title} ==========");
    for (label, value) in rows {
        println!("{label}: {value}");
    }
    println!("{}", "=".repeat(title.chars().count() + 22));
    println!();
}
