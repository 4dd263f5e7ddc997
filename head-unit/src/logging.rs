//! Log backend setup
//!
//! The engine logs through the `log` facade with `[Component]` prefixes.
//! Hosts that already install a logger can skip [`init`].

use std::sync::Once;

use log::info;

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Install `env_logger`, honoring `RUST_LOG` and defaulting to `info`
pub fn init() {
    INIT_LOGGER.call_once(|| {
        let installed = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .format_timestamp_millis()
        .try_init()
        .is_ok();

        if installed {
            info!("[Logging] aa-headunit {} initialized", crate::VERSION);
        }
    });
}
