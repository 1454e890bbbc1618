//! Process-wide logging setup.
//!
//! Installs the tracing subscriber exactly once. Level selection follows
//! the `TELECAST_LOG` environment variable, falling back to `info`.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global tracing subscriber. Safe to call more than once;
/// only the first call has any effect.
pub fn setup() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("TELECAST_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));

        // try_init so embedding frontends (and tests) that already
        // installed a subscriber are left alone.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
