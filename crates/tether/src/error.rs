//! Error types for `tether` handles.
//!
//! Only two things can go wrong without violating an ownership invariant:
//! the allocator can refuse a control block, and a caller can ask an empty
//! handle for its resource. Reference count overflow is treated like the
//! runtime treats it elsewhere, as a panic.

use std::fmt;

/// Errors returned by fallible handle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The allocator could not provide a control block.
    OutOfMemory {
        /// Size in bytes of the block that was requested.
        size: usize,
    },

    /// The handle does not own or observe a resource.
    EmptyHandle,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory { size } => {
                write!(f, "Out of memory: failed to allocate control block of {size} bytes")
            }
            Error::EmptyHandle => write!(f, "Handle is empty"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for `tether` operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", Error::OutOfMemory { size: 48 }),
            "Out of memory: failed to allocate control block of 48 bytes"
        );
        assert_eq!(format!("{}", Error::EmptyHandle), "Handle is empty");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(Error::EmptyHandle, Error::EmptyHandle);
        assert_ne!(
            Error::OutOfMemory { size: 16 },
            Error::OutOfMemory { size: 32 }
        );
    }

    #[test]
    fn test_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(Error::EmptyHandle);
        assert_eq!(err.to_string(), "Handle is empty");
    }
}
