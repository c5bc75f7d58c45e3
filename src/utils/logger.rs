// src/utils/logger.rs

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static LOGGER: OnceLock<ConsoleLogger> = OnceLock::new();

struct ConsoleLogger {
  level: LevelFilter,
}

/// Parses "error" / "warn" / "info" / "debug" / "trace"; anything else is Info.
pub fn parse_level(name: &str) -> LevelFilter {
  name.trim().parse().unwrap_or(LevelFilter::Info)
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
  let logger = LOGGER.get_or_init(|| ConsoleLogger { level });
  log::set_logger(logger).map(|()| log::set_max_level(level))
}

fn format_line(level: Level, target: &str, args: &std::fmt::Arguments, secs: u64) -> String {
  let icon = match level {
    Level::Error => "🔴",
    Level::Warn => "🟠",
    Level::Info => "🔵",
    Level::Debug => "⚪",
    Level::Trace => "▫️",
  };
  // Seconds within the day, UTC
  let (h, m, s) = ((secs / 3600) % 24, (secs / 60) % 60, secs % 60);
  // Keep only the module, not the crate prefix
  let module = target.split("::").skip(1).collect::<Vec<_>>().join("::");
  if module.is_empty() {
    format!("{:02}:{:02}:{:02} {}  {}", h, m, s, icon, args)
  } else {
    format!("{:02}:{:02}:{:02} {}  [{}] {}", h, m, s, icon, module, args)
  }
}

impl log::Log for ConsoleLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= self.level
  }

  fn log(&self, record: &Record) {
    if !self.enabled(record.metadata()) {
      return;
    }
    // Third-party crates only get warnings and above
    if !record.target().starts_with(env!("CARGO_CRATE_NAME")) && record.level() > Level::Warn {
      return;
    }

    let secs = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or(0);
    let line = format_line(record.level(), record.target(), record.args(), secs);

    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "{}", line);
  }

  fn flush(&self) {
    let _ = std::io::stderr().flush();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_level() {
    assert_eq!(parse_level("debug"), LevelFilter::Debug);
    assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
    assert_eq!(parse_level("chatty"), LevelFilter::Info);
  }

  #[test]
  fn test_format_line() {
    let line = format_line(
      Level::Warn,
      "cview_embed::jobs::cache",
      &format_args!("disk full"),
      3600 * 25 + 61,
    );
    assert_eq!(line, "01:01:01 🟠  [jobs::cache] disk full");
  }
}
