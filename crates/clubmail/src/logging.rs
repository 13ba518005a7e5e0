//! Tracing setup for binaries embedding this crate.

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Installs a global tracing subscriber with an env-driven filter and a
/// bridge for `log` records emitted by the database layer. Call once at
/// startup; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    if tracing_log::LogTracer::init().is_err() {
        return;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();
}
