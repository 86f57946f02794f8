//! Error types and exit statuses for kstress.

use nix::errno::Errno;
use thiserror::Error;

/// Result type alias for kstress operations
pub type Result<T> = std::result::Result<T, StressError>;

/// Main error type for kstress.
///
/// Only conditions that end a stressor instance surface as errors. Correctness
/// violations found while stressing are reported through
/// [`StressArgs::report_failure`](crate::StressArgs::report_failure) instead.
#[derive(Error, Debug)]
pub enum StressError {
    /// I/O errors from filesystem operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A system call failed
    #[error("{op} failed: {errno}")]
    Syscall {
        /// Name of the failing call
        op: &'static str,
        /// Error code returned by the kernel
        errno: Errno,
    },

    /// Errno surfaced through a nix wrapper without extra context
    #[error("System error: {0}")]
    Nix(#[from] nix::Error),

    /// Invalid configuration parameter
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message describing the configuration issue
        message: String,
    },
}

impl StressError {
    /// Create a new system call error
    pub fn syscall(op: &'static str, errno: Errno) -> Self {
        Self::Syscall { op, errno }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Underlying kernel error code, if there is one
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::Syscall { errno, .. } => Some(*errno),
            Self::Nix(errno) => Some(*errno),
            Self::Io(err) => err.raw_os_error().map(Errno::from_raw),
            Self::InvalidConfig { .. } => None,
        }
    }

    /// Check if this error was caused by the system running out of something
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self.exit_status(), ExitStatus::NoResource)
    }

    /// Exit status a stressor instance should report for this error
    pub fn exit_status(&self) -> ExitStatus {
        self.errno().map_or(ExitStatus::Failure, ExitStatus::from_errno)
    }
}

/// Process exit status of a stressor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
    NotSuccess = 2,
    NoResource = 3,
    NotImplemented = 4,
}

impl ExitStatus {
    /// Map a kernel error to the status reported for it
    pub fn from_errno(errno: Errno) -> Self {
        match errno {
            Errno::ENOMEM | Errno::ENOSPC | Errno::EMFILE | Errno::ENFILE => Self::NoResource,
            Errno::ENOSYS => Self::NotImplemented,
            _ => Self::Failure,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Rank used to pick one status for a set of instances
    fn severity(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::NotImplemented => 1,
            Self::NoResource => 2,
            Self::NotSuccess => 3,
            Self::Failure => 4,
        }
    }

    /// Most severe status in `statuses`; `Success` if there are none
    pub fn worst<I: IntoIterator<Item = ExitStatus>>(statuses: I) -> Self {
        statuses
            .into_iter()
            .max_by_key(|status| status.severity())
            .unwrap_or(Self::Success)
    }
}

impl<T> From<&Result<T>> for ExitStatus {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => err.exit_status(),
        }
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::StressError::config(format!($($arg)*))
    };
}
