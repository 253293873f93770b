use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info,campus_security=debug";

/// Install a global `fmt` subscriber honoring `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`].
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    init_tracing_with(DEFAULT_FILTER)
}

/// Same as [`init_tracing`] with a caller-supplied fallback filter.
pub fn init_tracing_with(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
