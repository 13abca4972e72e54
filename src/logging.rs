//! Tracing initialization for host applications and examples.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Set
/// `LOG_FORMAT=json` for structured output. Safe to call more than once;
/// subsequent calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    // A host may have installed its own subscriber already.
    let _ = result;
}
