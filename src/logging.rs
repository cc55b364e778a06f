use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

/// Installs the fmt subscriber, filtered by `RUST_LOG` or [`DEFAULT_FILTER`].
/// Calling it again is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
