//! Centralized Constants
//!
//! Single source of truth for the engine's sizing and timing defaults.
//!
//! # Note
//!
//! Register offsets and bit definitions live in [`super::register`].

// =============================================================================
// Table Sizes
// =============================================================================

/// Default number of instruction slots (matches the reference hardware build)
pub const DEFAULT_INSTRUCTION_COUNT: usize = 8;

/// Default number of channels for the convenience engine aliases
pub const DEFAULT_CHANNEL_COUNT: usize = 2;

/// Default number of sinks for the convenience engine aliases
pub const DEFAULT_SINK_COUNT: usize = 2;

// =============================================================================
// Data Path
// =============================================================================

/// Width of one transfer unit in bytes
pub const WORD_BYTES: u64 = 4;

/// Default quantum for sinks that respect data quantum (8 KiB of words)
pub const DEFAULT_QUANTUM_WORDS: u32 = 2048;

// =============================================================================
// Timing
// =============================================================================

/// Poll interval while waiting for a channel to halt
pub const HALT_POLL_INTERVAL_US: u32 = 10;

/// Default timeout while waiting for a channel to halt
pub const HALT_TIMEOUT_US: u32 = 100_000;
