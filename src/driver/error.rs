//! Error types for the bonded DMA engine
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Synchronous configuration failures (bad index, missing bond)
//! - [`TransferError`]: Asynchronous per-channel/per-sink transfer faults
//! - [`IoError`]: Host-side polling failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by the host driver methods that can fail in more than one way.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration errors
///
/// Raised by the configuration interface before any register is touched, so a
/// failed call never leaves partially written state behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Channel, sink or instruction index outside the configured table size
    OutOfRange,
    /// A bond was enabled without naming the bonded instruction
    MissingBondAddress,
    /// Invalid configuration parameter
    InvalidConfig,
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
            ConfigError::OutOfRange => "index out of range",
            ConfigError::MissingBondAddress => "bond enabled without bond address",
            ConfigError::InvalidConfig => "invalid configuration",
        }
    }
}

// =============================================================================
// Transfer Errors
// =============================================================================

/// Transfer faults raised by the execution state machine
///
/// These never cross the host's call stack as a `Result`. The engine latches
/// them into the channel and sink status registers; the host polls (or waits
/// on) the flag and must disable the channel before reconfiguring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// Source address outside the addressable range of the channel's device
    SourceOutOfRange,
    /// Destination address outside the addressable range of the sink's device
    SinkOutOfRange,
}

impl core::fmt::Display for TransferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransferError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransferError::SourceOutOfRange => "source address out of range",
            TransferError::SinkOutOfRange => "sink address out of range",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Host-side polling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Operation timed out
    Timeout,
    /// Invalid state for operation (e.g., channel not enabled)
    InvalidState,
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
            IoError::Timeout => "operation timed out",
            IoError::InvalidState => "invalid state for operation",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::OutOfRange)) => { /* ... */ }
///     Err(Error::Transfer(TransferError::SinkOutOfRange)) => { /* ... */ }
///     Err(Error::Io(IoError::Timeout)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// Transfer error observed through a status register
    Transfer(TransferError),
    /// I/O error
    Io(IoError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Transfer(e) => write!(f, "transfer: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
        }
    }
}

// From impls for automatic conversion
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Error::Transfer(e)
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

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Unit Tests
// =============================================================================
