//! Tracing setup: stderr always, plus a daily log file when configured.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

const LOG_FILE_NAME: &str = "hoopstat.log";

/// Filter used when no environment override is present.
///
/// Each `-v` raises the crate's level one step past the configured filter.
pub fn default_directive(configured: Option<&str>, verbose: u8) -> String {
  match verbose {
    0 => configured.unwrap_or("hoopstat=info").to_string(),
    1 => "hoopstat=debug".to_string(),
    _ => "hoopstat=trace".to_string(),
  }
}

/// Install the global subscriber.
///
/// `HOOPSTAT_LOG` takes precedence over `RUST_LOG`. The returned guard
/// flushes the file writer and must live until exit.
pub fn init(config: &LoggingConfig, verbose: u8) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env("HOOPSTAT_LOG")
    .or_else(|_| EnvFilter::try_from_default_env())
    .unwrap_or_else(|_| EnvFilter::new(default_directive(config.filter.as_deref(), verbose)));

  let console_layer = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(true);

  let (file_layer, guard) = match config.directory.as_deref().map(file_writer) {
    Some(Ok((writer, guard))) => (
      Some(
        tracing_subscriber::fmt::layer()
          .with_writer(writer)
          .with_ansi(false)
          .with_target(true),
      ),
      Some(guard),
    ),
    Some(Err(e)) => {
      eprintln!("Warning: file logging disabled: {e}");
      (None, None)
    }
    None => (None, None),
  };

  // A subscriber may already be installed (tests, embedding callers).
  let _ = tracing_subscriber::registry()
    .with(filter)
    .with(console_layer)
    .with(file_layer)
    .try_init();

  guard
}

fn file_writer(
  directory: &Path,
) -> std::io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
  // rolling::daily panics when it cannot create the file, so check first.
  std::fs::create_dir_all(directory)?;
  let marker = directory.join(".hoopstat_write_test");
  std::fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(&marker)?;
  let _ = std::fs::remove_file(&marker);

  let appender = tracing_appender::rolling::daily(directory, LOG_FILE_NAME);
  Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_directive() {
    assert_eq!(default_directive(None, 0), "hoopstat=info");
    assert_eq!(default_directive(Some("warn"), 0), "warn");
    assert_eq!(default_directive(Some("warn"), 1), "hoopstat=debug");
    assert_eq!(default_directive(None, 3), "hoopstat=trace");
  }

  #[test]
  fn test_file_writer_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("logs").join("hoopstat");
    let (_writer, _guard) = file_writer(&nested).unwrap();
    assert!(nested.is_dir());
    assert!(!nested.join(".hoopstat_write_test").exists());
  }
}
