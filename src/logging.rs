/// Logging Module
///
/// Writes one line per event to an append-mode log file:
/// `<YYYY-MM-DD HH:MM:SS> - <LEVEL> - <message>`
use std::{fmt, fs::File, path::Path};

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Event formatter producing `timestamp - LEVEL - message` lines
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        write!(writer, "{} - {} - ", Local::now().format(TIMESTAMP_FORMAT), event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber writing to `path`
///
/// The returned guard flushes pending lines on drop and must be held until
/// the process is done logging.
pub fn init(path: &Path) -> std::io::Result<WorkerGuard> {
    let file = File::options().append(true).create(true).open(path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().event_format(LineFormat).with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}
