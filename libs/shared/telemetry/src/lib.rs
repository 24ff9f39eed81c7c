// [libs/shared/telemetry/src/lib.rs]

//! Tracing init and panic capture shared by `apps/orchestrator` and
//! `apps/scan-worker`: dev-readable logs locally, flat JSON in production,
//! and a panic hook that logs instead of letting a secondary thread's panic
//! take the whole process down silently.

use std::panic;

use tracing::{error, info, instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber and panic hook for `service`.
///
/// Honors `RUST_LOG` if set; otherwise defaults to `debug` for `service`'s
/// own target and `info`/`warn` for noisy infrastructure crates. Emits
/// compact colored output in debug builds, flattened JSON otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
#[instrument(skip_all)]
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{service}={level},tower_http=warn,hyper=warn,libsql=error",
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    let service_id = service.to_string();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");

        error!(target: "panic", service = %service_id, at = %location, "thread panicked: {payload}");
    }));

    info!(service, "tracing initialized");
}
