//! Leveled terminal logging with box-drawing decoration.
//!
//! All output goes through the static `Log` facade. Two global switches control
//! it: one silences everything (used by `--check` and noisy tests), the other
//! gates `log_debug` output behind `--debug`.

use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Severity of a prefixed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug, // Only shown with --debug
    Info,  // Status updates
    Warn,  // Non-fatal problems
    Err,   // Recoverable failures
    Crit,  // Needs operator attention
}

impl LogLevel {
    fn prefix(self) -> &'static str {
        match self {
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Info => "[INFO]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Err => "[ERR]",
            LogLevel::Crit => "[CRIT]",
        }
    }
}

/// Main logging interface providing structured output formatting.
pub struct Log;

impl Log {
    /// Enable or disable all log output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable or disable `log_debug` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Format a prefixed line without printing it.
    pub fn format_line(level: LogLevel, message: &str) -> String {
        format!("┣ {} {}", level.prefix(), message)
    }

    /// Print a message with its level prefix.
    ///
    /// Debug lines are dropped unless debug output is enabled.
    pub fn log(level: LogLevel, message: &str) {
        if !Self::is_enabled() {
            return;
        }
        if level == LogLevel::Debug && !Self::is_debug() {
            return;
        }
        match level {
            LogLevel::Err | LogLevel::Crit => eprintln!("{}", Self::format_line(level, message)),
            _ => println!("{}", Self::format_line(level, message)),
        }
    }

    // ═══ Convenience Methods for Common Log Levels ═══

    pub fn log_error(message: &str) {
        Self::log(LogLevel::Err, message);
    }

    pub fn log_warning(message: &str) {
        Self::log(LogLevel::Warn, message);
    }

    pub fn log_info(message: &str) {
        Self::log(LogLevel::Info, message);
    }

    pub fn log_debug(message: &str) {
        Self::log(LogLevel::Debug, message);
    }

    pub fn log_critical(message: &str) {
        Self::log(LogLevel::Crit, message);
    }

    // ═══ Visual Formatting Functions ═══

    /// Main status line with a branch marker.
    pub fn log_decorated(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┣ {}", message);
    }

    /// Detail line nested under the previous status line.
    pub fn log_indented(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┃   {}", message);
    }

    pub fn log_pipe() {
        if !Self::is_enabled() {
            return;
        }
        println!("┃");
    }

    /// Separate a new phase of output from what came before.
    pub fn log_block_start(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┃");
        println!("┣ {}", message);
    }

    /// Header printed once at startup.
    pub fn log_version() {
        if !Self::is_enabled() {
            return;
        }
        println!("┏ suntheme v{} ━━╸", env!("CARGO_PKG_VERSION"));
        println!("┃");
    }

    pub fn log_end() {
        if !Self::is_enabled() {
            return;
        }
        println!("╹");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_enable_toggle() {
        let original = Log::is_enabled();
        Log::set_enabled(false);
        assert!(!Log::is_enabled());
        Log::set_enabled(true);
        assert!(Log::is_enabled());
        Log::set_enabled(original);
    }

    #[test]
    #[serial]
    fn test_debug_toggle() {
        let original = Log::is_debug();
        Log::set_debug(true);
        assert!(Log::is_debug());
        Log::set_debug(false);
        assert!(!Log::is_debug());
        Log::set_debug(original);
    }

    #[test]
    fn test_format_line_prefixes() {
        assert_eq!(Log::format_line(LogLevel::Info, "hi"), "┣ [INFO] hi");
        assert_eq!(Log::format_line(LogLevel::Warn, "careful"), "┣ [WARN] careful");
        assert_eq!(Log::format_line(LogLevel::Err, "x"), "┣ [ERR] x");
    }
}
