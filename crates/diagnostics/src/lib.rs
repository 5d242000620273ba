//! Structured logging shared by every Sluice crate
//!
//! Usage:
//! - Set SLUICE_LOG=off - no logs
//! - Set SLUICE_LOG=info - logins, uploads, loads (server default)
//! - Set SLUICE_LOG=debug - scratch files, request details, job polling

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable holding the log level
pub const LOG_ENV: &str = "SLUICE_LOG";

static INIT: Once = Once::new();

/// Map a level name to an emit filter level. `None` means logging is off.
pub fn parse_level(name: &str) -> Result<Option<emit::Level>, String> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => Ok(None),
        "error" => Ok(Some(emit::Level::Error)),
        "warn" | "warning" => Ok(Some(emit::Level::Warn)),
        "info" => Ok(Some(emit::Level::Info)),
        "debug" | "trace" => Ok(Some(emit::Level::Debug)),
        other => Err(format!("unknown log level '{other}'")),
    }
}

/// Initialize diagnostics from SLUICE_LOG, falling back to `default_level`
///
/// Call once at startup. Later calls are ignored.
pub fn init_diagnostics(default_level: &str) {
    INIT.call_once(|| {
        let requested = std::env::var(LOG_ENV).unwrap_or_else(|_| default_level.to_string());

        let (level, complaint) = match parse_level(&requested) {
            Ok(level) => (level, None),
            Err(problem) => (Some(emit::Level::Info), Some(problem)),
        };

        let Some(level) = level else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        if let Some(problem) = complaint {
            emit::warn!("{problem}, using info", problem);
        }

        // The runtime lives as long as the process.
        std::mem::forget(rt);
    });
}

pub use init_diagnostics as init;

/// Routine operations: logins, uploads, completed loads
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Detail useful when chasing a problem
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Recoverable trouble: rejected logins, client mistakes
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Failed stores, failed loads, startup problems
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}
