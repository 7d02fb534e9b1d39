//! Console diagnostics for the `apm` binary

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive
pub const LOG_ENV: &str = "APM_LOG";

/// Install the global console subscriber
///
/// `APM_LOG` wins when set. Otherwise only warnings are shown, or debug
/// events from this crate when `verbose` is on.
pub fn register_console_tracer(verbose: bool) -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::format()
        .compact()
        .with_file(verbose)
        .with_line_number(verbose)
        .with_thread_ids(false)
        .with_target(false);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_writer(std::io::stderr);

    let default_directive = if verbose { "warn,apm=debug" } else { "warn" };
    let filter_layer = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| {
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .parse(default_directive)
        })
        .context("invalid log filter")?;

    let tracer = tracing_subscriber::registry().with(filter_layer).with(fmt_layer);
    tracing::subscriber::set_global_default(tracer).context("a global tracer is already installed")
}
