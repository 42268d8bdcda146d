//! Error types for the KS8851 driver
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Attach and configuration failures
//! - [`BufferError`]: Scratch buffer and queue allocation failures
//! - [`IoError`]: Runtime TX/RX failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods.
//!
//! Individual register and FIFO exchanges never surface here: a failed bus
//! exchange is logged, counted and read back as zero (see [`crate::hal::spi`]).

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and attach errors
///
/// These errors occur while probing the chip or changing settings that are
/// only valid while the interface is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Chip identity register never reported the expected ID
    DeviceNotFound,
    /// MAC address is multicast or all zeros
    InvalidMacAddress,
    /// Invalid configuration parameter
    InvalidConfig,
    /// Operation requires the interface to be stopped
    AlreadyOpen,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::DeviceNotFound => "chip ID not recognised",
            ConfigError::InvalidMacAddress => "invalid MAC address",
            ConfigError::InvalidConfig => "invalid configuration",
            ConfigError::AlreadyOpen => "interface is open",
        }
    }
}

// =============================================================================
// Buffer Errors
// =============================================================================

/// Allocation errors
///
/// Raised when a per-operation buffer or a queued frame copy cannot be
/// allocated. The attempt is abandoned; queued state is left intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Heap allocation failed
    OutOfMemory,
}

impl core::fmt::Display for BufferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BufferError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BufferError::OutOfMemory => "out of memory",
        }
    }
}

impl From<alloc::collections::TryReserveError> for BufferError {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        BufferError::OutOfMemory
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime TX/RX errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Invalid state for operation (e.g., not open)
    InvalidState,
    /// Invalid frame length (zero)
    InvalidLength,
    /// Frame does not fit in one transmit batch
    FrameTooLarge,
    /// SPI exchange failed
    Bus,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::InvalidState => "invalid state for operation",
            IoError::InvalidLength => "invalid frame length",
            IoError::FrameTooLarge => "frame too large for transmit batch",
            IoError::Bus => "SPI bus error",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::DeviceNotFound)) => { /* ... */ }
///     Err(Error::Buffer(BufferError::OutOfMemory)) => { /* ... */ }
///     Err(Error::Io(IoError::FrameTooLarge)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// Allocation error
    Buffer(BufferError),
    /// I/O error
    Io(IoError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Buffer(e) => write!(f, "buffer: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        Error::Buffer(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for allocation-bound operations
pub type BufferResult<T> = core::result::Result<T, BufferError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Unit Tests
// =============================================================================
