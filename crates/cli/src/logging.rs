use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Env var holding the log filter (`EnvFilter` syntax, e.g. `revboard=debug`).
pub const LOG_ENV: &str = "REVBOARD_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Install the stderr subscriber once. Library crates log through `log`;
/// those records are bridged into the same subscriber.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // A subscriber set by the embedding process wins.
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
