use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use waweb_core::config::LoggingConfig;

const DEFAULT_FILTER: &str = "waweb_gateway=info,waweb_agent=info,tower_http=info";

/// Install the global subscriber: stdout plus, when `cfg.dir` is set, a
/// daily-rolling file. `RUST_LOG` overrides the default filter.
///
/// Keep the returned guard alive for the life of the process or buffered
/// file output is lost.
pub fn init(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let appender = (!cfg.dir.trim().is_empty()).then(|| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(cfg.file_prefix.as_str())
            .build(&cfg.dir)
    });

    let (file_layer, guard, file_error) = match appender {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard), None)
        }
        Some(Err(e)) => (None, None, Some(e.to_string())),
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!(dir = %cfg.dir, error = %e, "file logging disabled");
    }
    guard
}
