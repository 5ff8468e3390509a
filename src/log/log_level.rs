use std::fmt;

/// Defines the severity levels for log messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Designates very fine-grained informational events (per-frame traffic).
    Trace,
    /// Designates fine-grained informational events that are most useful to debug a session.
    Debug,
    /// Designates informational messages that highlight the progress of the server at coarse-grained level.
    Info,
    /// Designates potentially harmful situations (aborted transfers, dropped peers).
    Warn,
    /// Designates error events that still allow the process to continue running.
    Error,
}

impl LogLevel {
    /// Fixed-width label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
