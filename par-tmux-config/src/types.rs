use serde::{Deserialize, Serialize};

/// Verbosity of the debug log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging (log file not created)
    #[default]
    Off,
    /// Errors only
    Error,
    /// Protocol lifecycle events
    Info,
    /// Commands, replies and sync decisions
    Debug,
    /// Every line processed
    Trace,
}

impl LogLevel {
    /// Numeric level as used by the `DEBUG_LEVEL` environment variable.
    pub fn as_u8(&self) -> u8 {
        match self {
            LogLevel::Off => 0,
            LogLevel::Error => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
            LogLevel::Trace => 4,
        }
    }

    /// Parse the `DEBUG_LEVEL` numeric form. Out-of-range values map to `Off`.
    pub fn from_u8(level: u8) -> Self {
        match level {
            1 => LogLevel::Error,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            4 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}
