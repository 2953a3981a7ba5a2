//! Asynchronous logging for the ytuploader application
//!
//! This module provides a non-blocking logger behind the `log` facade that
//! writes entries to a file without blocking upload or matching work.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

/// Asynchronous logger that writes to file without blocking the caller
pub struct AsyncLogger {
    sender: Mutex<mpsc::Sender<LogMessage>>,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
    level: LevelFilter,
}

/// Messages understood by the writer thread
enum LogMessage {
    Entry(String),
    Flush(mpsc::Sender<()>),
    Shutdown,
}

impl AsyncLogger {
    /// Create a new async logger that appends to `log_path`
    pub fn new(log_path: &Path, level: LevelFilter) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let (tx, rx) = mpsc::channel::<LogMessage>();
        let handle = std::thread::spawn(move || {
            let mut file = std::io::BufWriter::new(log_file);
            let mut buffer = VecDeque::new();

            let drain = |buffer: &mut VecDeque<String>, file: &mut std::io::BufWriter<std::fs::File>| {
                for entry in buffer.drain(..) {
                    let _ = writeln!(file, "{}", entry);
                }
                let _ = file.flush();
            };

            // Blocks until the first message, then batches whatever else is queued
            while let Ok(msg) = rx.recv() {
                let mut pending = vec![msg];
                while let Ok(more) = rx.try_recv() {
                    pending.push(more);
                }
                for msg in pending {
                    match msg {
                        LogMessage::Entry(entry) => buffer.push_back(entry),
                        LogMessage::Flush(done) => {
                            drain(&mut buffer, &mut file);
                            let _ = done.send(());
                        }
                        LogMessage::Shutdown => {
                            drain(&mut buffer, &mut file);
                            return;
                        }
                    }
                }
                if buffer.len() >= 10 {
                    drain(&mut buffer, &mut file);
                }
            }
            drain(&mut buffer, &mut file);
        });

        Ok(AsyncLogger {
            sender: Mutex::new(tx),
            handle: Mutex::new(Some(handle)),
            level,
        })
    }

    fn send(&self, msg: LogMessage) {
        if let Ok(sender) = self.sender.lock() {
            // The writer thread is gone after shutdown; late entries are dropped
            let _ = sender.send(msg);
        }
    }

    /// Gracefully stop the writer thread after writing everything queued
    pub fn shutdown(&self) {
        self.send(LogMessage::Shutdown);
        if let Ok(mut guard) = self.handle.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Log for AsyncLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!(
            "[{} {} {}] {}",
            record.level(),
            timestamp,
            record.target(),
            record.args()
        );
        self.send(LogMessage::Entry(entry));
    }

    fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        self.send(LogMessage::Flush(done_tx));
        let _ = done_rx.recv_timeout(std::time::Duration::from_secs(2));
    }
}

// Global logger instance
static LOGGER: OnceCell<AsyncLogger> = OnceCell::new();

/// Default location of the diagnostic log file
pub fn default_log_path() -> std::io::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg_dirs) = xdg::BaseDirectories::new() {
            return Ok(xdg_dirs.get_cache_home().join("ytuploader").join("ytuploader.log"));
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        if let Some(cache) = dirs::cache_dir() {
            return Ok(cache.join("ytuploader").join("ytuploader.log"));
        }
    }

    let home_dir = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "Failed to get home directory")
    })?;
    Ok(home_dir.join(".ytuploader").join("ytuploader.log"))
}

/// Install the file logger as the global `log` backend
pub fn setup_logging(level: LevelFilter) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = default_log_path()?;
    let logger = AsyncLogger::new(&path, level)?;
    let logger = LOGGER
        .try_insert(logger)
        .map_err(|_| "Logger already initialized")?;
    log::set_logger(logger).map_err(|e| format!("Failed to install logger: {}", e))?;
    log::set_max_level(level);
    Ok(path)
}

/// Flush and stop the global file logger, if one was installed
pub fn shutdown_logging() {
    if let Some(logger) = LOGGER.get() {
        logger.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn entries_reach_the_file_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("test.log");
        let logger = AsyncLogger::new(&path, LevelFilter::Info).unwrap();

        logger.log(
            &Record::builder()
                .args(format_args!("upload finished"))
                .level(Level::Info)
                .target("ytuploader::batch")
                .build(),
        );
        logger.log(
            &Record::builder()
                .args(format_args!("too chatty"))
                .level(Level::Debug)
                .target("ytuploader::batch")
                .build(),
        );
        logger.flush();
        logger.shutdown();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[INFO"));
        assert!(content.contains("upload finished"));
        assert!(!content.contains("too chatty"));
    }
}
