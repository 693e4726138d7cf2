use std::io::{IsTerminal, Write};
use std::time::Instant;

use anstyle::{AnsiColor, Style};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

struct ArgotLogger {
    stderr: Mutex<std::io::Stderr>,
    color: bool,
    file: Option<Mutex<std::fs::File>>,
    filter: LevelFilter,
    start: Instant,
}

impl Log for ArgotLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = Instant::now().duration_since(self.start).as_secs_f64();
        let level = record.level();
        let style = if self.color {
            level_style(level)
        } else {
            Style::new()
        };
        let _ = writeln!(
            self.stderr.lock(),
            "[{elapsed:.3}s] [{style}{level}{style:#}] {} - {}",
            record.target(),
            record.args()
        );

        if let Some(ref file) = self.file {
            let _ = writeln!(
                file.lock(),
                "[{elapsed:.3}s] [{level}] {} - {}",
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = self.stderr.lock().flush();
        if let Some(ref file) = self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Parse `RUST_LOG` as a single level, falling back to `warn`
#[must_use]
pub fn filter_from_env(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(LevelFilter::Warn)
}

/// Initialize the global logger. Must be called once before any logging.
///
/// # Errors
///
/// Returns `SetLoggerError` if a logger has already been installed.
pub fn init(log_file: Option<std::fs::File>) -> Result<(), log::SetLoggerError> {
    let filter = filter_from_env(std::env::var("RUST_LOG").ok().as_deref());
    let stderr = std::io::stderr();

    let logger = ArgotLogger {
        color: stderr.is_terminal(),
        stderr: Mutex::new(stderr),
        file: log_file.map(Mutex::new),
        filter,
        start: Instant::now(),
    };

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(filter);
    Ok(())
}

/// Terminal style for a log level
#[must_use]
pub fn level_style(level: Level) -> Style {
    let color = match level {
        Level::Error => AnsiColor::Red,
        Level::Warn => AnsiColor::Yellow,
        Level::Info => AnsiColor::Blue,
        Level::Debug | Level::Trace => AnsiColor::BrightBlack,
    };
    Style::new().fg_color(Some(color.into()))
}
