//! Structured logging setup: `tracing-subscriber` with an `EnvFilter`
//! derived from `-v` repetition count, falling back to `RUST_LOG`.

/// Initialise the global `tracing` subscriber.
///
/// `verbosity` is the CLI's `-v` repeat count: `0` is `info`, `1` is
/// `debug`, `2+` is `trace`. `RUST_LOG`, if set, takes precedence.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("txn_server={default_level},txn_core={default_level},txn_http={default_level},txn_db={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
