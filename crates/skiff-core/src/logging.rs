//! Minimal structured logging.
//!
//! One line per event on stderr, filtered by a process-global level. The
//! server, connection handler, static file server and WebSocket workers log
//! through the `log_*!` macros; applications may use them too.
//!
//! ```
//! use skiff_core::logging::{self, LogConfig, LogLevel};
//!
//! logging::init(LogConfig::new().level(LogLevel::Debug));
//! skiff_core::log_info!("listening on port {}", 8080);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Most verbose.
    Trace = 0,
    /// Diagnostic detail.
    Debug = 1,
    /// Normal operation (default minimum).
    Info = 2,
    /// Unexpected but recoverable.
    Warn = 3,
    /// A failure that affected a connection or request.
    Error = 4,
}

impl LogLevel {
    /// Uppercase fixed-width tag for line output.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warn => "WARN ",
            Self::Error => "ERROR",
        }
    }
}

/// Logger configuration.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Minimum level that gets emitted.
    pub level: LogLevel,
    /// Whether to include the module path of the call site.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Default configuration: `Info` level, targets shown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level.
    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Toggle call-site module paths in output.
    #[must_use]
    pub fn include_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INCLUDE_TARGET: AtomicBool = AtomicBool::new(true);

/// Apply a configuration. May be called at any time; takes effect for all
/// subsequent log calls.
pub fn init(config: LogConfig) {
    MIN_LEVEL.store(config.level as u8, Ordering::Relaxed);
    INCLUDE_TARGET.store(config.include_target, Ordering::Relaxed);
}

/// Whether a level would currently be emitted.
#[must_use]
pub fn enabled(level: LogLevel) -> bool {
    level as u8 >= MIN_LEVEL.load(Ordering::Relaxed)
}

/// Emit one log line. Prefer the `log_*!` macros, which capture the call
/// site's module path.
pub fn write(level: LogLevel, target: &str, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    if INCLUDE_TARGET.load(Ordering::Relaxed) {
        eprintln!(
            "{}.{:03} {} {}: {}",
            now.as_secs(),
            now.subsec_millis(),
            level.tag(),
            target,
            args
        );
    } else {
        eprintln!(
            "{}.{:03} {} {}",
            now.as_secs(),
            now.subsec_millis(),
            level.tag(),
            args
        );
    }
}

/// Log at `Error` level.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::write($crate::logging::LogLevel::Error, module_path!(), format_args!($($arg)*))
    };
}

/// Log at `Warn` level.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::write($crate::logging::LogLevel::Warn, module_path!(), format_args!($($arg)*))
    };
}

/// Log at `Info` level.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::write($crate::logging::LogLevel::Info, module_path!(), format_args!($($arg)*))
    };
}

/// Log at `Debug` level.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::write($crate::logging::LogLevel::Debug, module_path!(), format_args!($($arg)*))
    };
}
