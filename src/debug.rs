//! Category-tagged debug log for the control mode client
//!
//! Controlled by the DEBUG_LEVEL environment variable, or by
//! `TmuxConfig::log_level` through [`init`]:
//! - 0 or unset: No debugging
//! - 1: Errors only (protocol desync, failed syncs)
//! - 2: Info level (control mode lifecycle, sessions created/destroyed)
//! - 3: Debug level (commands sent, replies, sync decisions)
//! - 4: Trace level (every protocol line)
//!
//! All output goes to /tmp/par_tmux_debug.log on Unix/macOS,
//! or %TEMP%\par_tmux_debug.log on Windows.
//! The byte stream being parsed is usually the user's terminal, so nothing
//! is ever written to stdout/stderr from here.

use parking_lot::Mutex;
use par_tmux_config::LogLevel;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_env() -> Option<Self> {
        std::env::var("DEBUG_LEVEL")
            .ok()
            .and_then(|val| val.trim().parse::<u8>().ok())
            .map(|n| LogLevel::from_u8(n).into())
    }
}

impl From<LogLevel> for DebugLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => DebugLevel::Off,
            LogLevel::Error => DebugLevel::Error,
            LogLevel::Info => DebugLevel::Info,
            LogLevel::Debug => DebugLevel::Debug,
            LogLevel::Trace => DebugLevel::Trace,
        }
    }
}

struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
}

impl DebugLogger {
    fn new(level: DebugLevel) -> Self {
        let mut logger = DebugLogger { level, file: None };
        logger.open();
        logger
    }

    fn log_path() -> std::path::PathBuf {
        #[cfg(unix)]
        {
            std::path::PathBuf::from("/tmp/par_tmux_debug.log")
        }
        #[cfg(not(unix))]
        {
            std::env::temp_dir().join("par_tmux_debug.log")
        }
    }

    fn open(&mut self) {
        if self.level == DebugLevel::Off || self.file.is_some() {
            return;
        }

        // Silently fail if log file can't be opened
        if let Ok(f) = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(Self::log_path())
        {
            self.file = Some(f);
            self.write_raw(&format!(
                "\n{}\npar-tmux debug session started at {} (level={:?})\n{}\n",
                "=".repeat(80),
                get_timestamp(),
                self.level,
                "=".repeat(80)
            ));
        }
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        if level <= self.level {
            let level_str = match level {
                DebugLevel::Error => "ERROR",
                DebugLevel::Info => "INFO ",
                DebugLevel::Debug => "DEBUG",
                DebugLevel::Trace => "TRACE",
                DebugLevel::Off => return,
            };
            self.write_raw(&format!(
                "[{}] [{}] [{}] {}\n",
                get_timestamp(),
                level_str,
                category,
                msg
            ));
        }
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| {
        Mutex::new(DebugLogger::new(
            DebugLevel::from_env().unwrap_or(DebugLevel::Off),
        ))
    })
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Apply the configured log level. `DEBUG_LEVEL` in the environment wins.
pub fn init(level: LogLevel) {
    let level = DebugLevel::from_env().unwrap_or_else(|| level.into());
    let mut logger = get_logger().lock();
    logger.level = level;
    logger.open();
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    let logger = get_logger().lock();
    level <= logger.level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    let mut logger = get_logger().lock();
    logger.log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if level == DebugLevel::Error {
        // Errors also reach the host application's `log` backend.
        ::log::error!("[{}] {}", category, args);
    }
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Error, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}
