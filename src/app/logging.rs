//! Tracing subscriber setup and the hook's log line format.
//!
//! Lines go to stderr so they end up in the scheduler's prologue/epilogue logs:
//! `YYYY-MM-DD HH:MM:SS [LEVEL] message`.

use tracing_subscriber::EnvFilter;

pub const VALID_LEVELS: &str = "TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL";

// Local wall-clock time: "YYYY-MM-DD HH:MM:SS"
pub struct LocalTimeFormatter;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        // SAFETY: localtime_r writes only into the zeroed `tm` we own.
        unsafe {
            let now = libc::time(std::ptr::null_mut());
            let mut tm: libc::tm = std::mem::zeroed();
            libc::localtime_r(&now, &mut tm);

            write!(w, "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                tm.tm_year + 1900,
                tm.tm_mon + 1,
                tm.tm_mday,
                tm.tm_hour,
                tm.tm_min,
                tm.tm_sec)
        }
    }
}

pub struct CustomEventFormat {
    pub ansi: bool,
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for CustomEventFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use tracing_subscriber::fmt::time::FormatTime;

        LocalTimeFormatter.format_time(&mut writer)?;
        write!(writer, " ")?;

        let level = event.metadata().level();
        if self.ansi {
            let level_color = match *level {
                tracing::Level::TRACE => "\x1b[2m",  // Dim/gray
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::ERROR => "\x1b[31m", // Red
            };
            write!(writer, "{}[{}]\x1b[0m ", level_color, level)?;
        } else {
            write!(writer, "[{}] ", level)?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Map a user-facing level name to an `EnvFilter` directive.
///
/// CRITICAL is logged at ERROR. Unknown names fall back to INFO.
pub fn filter_for_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "critical" => "error",
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => {
            eprintln!("Invalid log level '{}'. Using INFO. Valid levels: {}", level, VALID_LEVELS);
            "info"
        }
    }
}

/// Pick the log level: `--log-level`, then `LOG_LEVEL`, then the config file.
pub fn resolve_level(flag: Option<&str>, env: Option<String>, config_level: &str) -> String {
    flag.map(str::to_string)
        .or(env)
        .unwrap_or_else(|| config_level.to_string())
}

/// Install the global subscriber writing to stderr.
pub fn init_tracing(filter: &str) {
    use tracing_subscriber::prelude::*;

    let ansi = atty::is(atty::Stream::Stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_level(true)
                .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                .event_format(CustomEventFormat { ansi }),
        )
        .init();
}
