use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr subscriber. `RUST_LOG` wins over `level`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("cyclecast={level}")))
        .unwrap_or_else(|_| EnvFilter::new("cyclecast=warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
