use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber for the binaries.
///
/// `RUST_LOG` wins over `default_level` when set. Logs go to stderr so stdout
/// stays free for progress output.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
