use crate::log::{clock::format_log_timestamp, log_level::LogLevel};

/// One append-only log record.
///
/// Records are built by producers, moved into the logger queue and written
/// once by the logger worker; nothing mutates them afterwards.
#[derive(Debug, Clone)]
pub struct LogMsg {
    /// Severity of the record.
    pub level: LogLevel,
    /// Milliseconds since the UNIX epoch at creation time.
    pub ts_ms: u128,
    /// The message text.
    pub text: String,
    /// Module path the record originated from.
    pub target: &'static str,
}

impl LogMsg {
    pub fn new(
        level: LogLevel,
        text: impl Into<String>,
        target: &'static str,
        ts_ms: u128,
    ) -> Self {
        Self {
            level,
            ts_ms,
            text: text.into(),
            target,
        }
    }

    /// Renders the record as a single log line (no trailing newline).
    ///
    /// ```rust,ignore
    /// 2026-10-19 08:15:02.311 [INFO ] courier::server::listener | listening on 127.0.0.1:5050
    /// ```
    pub fn to_line(&self) -> String {
        format!(
            "{} [{:<5}] {} | {}",
            format_log_timestamp(self.ts_ms),
            self.level.label(),
            self.target,
            self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_contains_timestamp_level_and_text() {
        let msg = LogMsg::new(LogLevel::Warn, "peer gone", "courier::x", 0);
        assert_eq!(
            msg.to_line(),
            "1970-01-01 00:00:00.000 [WARN ] courier::x | peer gone"
        );
    }
}
