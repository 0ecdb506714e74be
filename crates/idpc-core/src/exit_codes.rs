//! Exit codes for plugin binaries.
//!
//! Checker plugins follow the monitoring-agent check convention (0 OK,
//! 1 WARNING, 2 CRITICAL, 3 UNKNOWN); runtime failures use codes >= 10.

use crate::capability::CheckStatus;

/// Exit codes for plugin runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Values emitted, or nothing to do
    Clean = 0,

    /// Check reported WARNING
    CheckWarning = 1,

    /// Check reported CRITICAL
    CheckCritical = 2,

    /// Check reported UNKNOWN
    CheckUnknown = 3,

    /// Plugin wiring or graph definition error
    ConfigError = 10,

    /// The plugin's own data source failed
    CapabilityError = 11,

    /// I/O error (stdout, state file)
    IoError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code indicates a runtime failure.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }
}

impl From<CheckStatus> for ExitCode {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Ok => ExitCode::Clean,
            CheckStatus::Warning => ExitCode::CheckWarning,
            CheckStatus::Critical => ExitCode::CheckCritical,
            CheckStatus::Unknown => ExitCode::CheckUnknown,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
