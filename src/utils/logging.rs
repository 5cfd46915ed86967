//! Logging setup and shared output formatting.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Priority: `RUST_LOG` env var > quiet flag > verbose count > `info`.
pub fn init(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // Progress goes to stderr; stdout is reserved for operation output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Render a byte count as KiB with one decimal, for profile diagnostics.
pub fn kib(bytes: u64) -> String {
    format!("{:.1} KiB", bytes as f64 / 1024.0)
}

/// Truncate long labels for log lines without splitting a char.
pub fn truncate_label(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
