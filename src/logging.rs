//! Run log: every log record goes to a per-run file and to stderr.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// `telemetry_YYYYmmdd_HHMMSS.log` for a run started at `started`
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("telemetry_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// `timestamp - LEVEL - message`
pub fn format_line(at: DateTime<Local>, level: Level, message: &str) -> String {
    format!("{} - {} - {}", at.format("%Y-%m-%d %H:%M:%S,%3f"), level_name(level), message)
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Logger writing to a run file and stderr
pub struct RunLogger {
    file: Mutex<File>,
    path: PathBuf,
    level: LevelFilter,
}

impl RunLogger {
    /// Create `log_dir` if needed and open a new run file in it
    pub fn create<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        let path = log_dir.join(log_file_name(Local::now()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            level: LevelFilter::Info,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) {
        // A failing sink must never take the collector down with it.
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", line);
            let _ = file.flush();
        }
        let _ = writeln!(io::stderr().lock(), "{}", line);
    }
}

impl Log for RunLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(Local::now(), record.level(), &record.args().to_string());
        self.write_line(&line);
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Install a [`RunLogger`] as the process logger; returns the run file path
pub fn init<P: AsRef<Path>>(log_dir: P) -> Result<PathBuf> {
    let logger = RunLogger::create(log_dir)?;
    let path = logger.path().to_path_buf();
    let level = logger.level;

    log::set_boxed_logger(Box::new(logger)).map_err(|e| anyhow!("Failed to install logger: {}", e))?;
    log::set_max_level(level);
    Ok(path)
}
