use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::LogFormat;

const DEFAULT_FILTER: &str = "convoy=debug,tower_http=debug";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Compact output is meant for
/// terminals; JSON output carries every structured field for log shippers.
pub fn init_tracing(format: LogFormat, service_name: &str) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("{},{}=debug", DEFAULT_FILTER, service_name.replace('-', "_")).into()
        })
    };

    match format {
        LogFormat::Compact => {
            let console_fmt = tracing_subscriber::fmt::layer().event_format(
                Format::default()
                    .compact()
                    .with_target(false)
                    .without_time(),
            );
            tracing_subscriber::registry()
                .with(filter())
                .with(console_fmt)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter())
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true),
                )
                .init();
        }
    }

    tracing::info!(service = service_name, format = ?format, "Tracing initialized");
}
