//! Error types for the hcisock library
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Errors that can occur when working with HCI sockets
///
/// Every transport variant carries the `std::io::Error` of the syscall that
/// failed. None of them are fatal: the socket stays usable afterwards.
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("Failed to bind to HCI device: {0}")]
    BindError(std::io::Error),

    #[error("HCI device ioctl failed: {0}")]
    IoctlError(std::io::Error),

    #[error("Failed to set HCI filter: {0}")]
    FilterError(std::io::Error),

    #[error("Failed to send HCI packet: {0}")]
    SendError(std::io::Error),

    #[error("Failed to receive HCI packet: {0}")]
    ReceiveError(std::io::Error),

    #[error("Failed to poll HCI socket: {0}")]
    PollError(std::io::Error),

    #[error("HCI socket is not bound")]
    NotBound,
}

impl HciError {
    /// Name of the syscall that produced this error, if any
    pub fn syscall(&self) -> Option<&'static str> {
        match self {
            Self::SocketError(_) => Some("socket"),
            Self::BindError(_) => Some("bind"),
            Self::IoctlError(_) => Some("ioctl"),
            Self::FilterError(_) => Some("setsockopt"),
            Self::SendError(_) => Some("write"),
            Self::ReceiveError(_) => Some("read"),
            Self::PollError(_) => Some("poll"),
            Self::NotBound => None,
        }
    }

    /// The underlying OS error code, if any
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::SocketError(e)
            | Self::BindError(e)
            | Self::IoctlError(e)
            | Self::FilterError(e)
            | Self::SendError(e)
            | Self::ReceiveError(e)
            | Self::PollError(e) => e.raw_os_error(),
            Self::NotBound => None,
        }
    }
}

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Convenience alias for results carrying an `HciError`
pub type Result<T> = std::result::Result<T, HciError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reports_syscall_and_errno() {
        let err = HciError::SendError(std::io::Error::from_raw_os_error(libc::ENETDOWN));
        assert_eq!(err.syscall(), Some("write"));
        assert_eq!(err.raw_os_error(), Some(libc::ENETDOWN));

        assert_eq!(HciError::NotBound.syscall(), None);
        assert_eq!(HciError::NotBound.raw_os_error(), None);
    }
}
