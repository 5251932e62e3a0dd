//! Spy compiler CLI entry point

fn main() {
    // SPICY_TRACE=1 turns on internal tracing; otherwise honor RUST_LOG, defaulting to warn.
    let default_filter = if std::env::var_os("SPICY_TRACE").is_some_and(|v| v == "1") {
        "spicy=trace"
    } else {
        "warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init();

    spicy::cli::run();
}
