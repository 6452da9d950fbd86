//! Diagnostic logging.
//!
//! Events go to stderr through `tracing-subscriber` so stdout only carries
//! command output. `RUST_LOG` takes precedence over `[logging].level`:
//!
//! ```bash
//! RUST_LOG=codealive=debug codealive search "auth flow" my-repo
//! ```

use std::sync::Once;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Install the global subscriber. Only the first call has an effect.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .without_time()
            .init();
    });
}
