//! Offline symbolication of event payloads.

use anyhow::{Context, Result};
use symbolicator_service::{logging, metrics};

use settings::Settings;

mod event;
mod output;
mod settings;

fn main() {
    match execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}

fn execute() -> Result<()> {
    let settings = Settings::get()?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: settings.config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: The runtime has not been started yet, so this is still single-threaded.
    unsafe { logging::init_logging(&settings.config) };
    metrics::init_metrics(&settings.config.metrics).context("failed to configure statsd")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the runtime")?;

    runtime.block_on(event::process_event(settings))
}
