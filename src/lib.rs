//! Bonded DMA Engine
//!
//! A `no_std`, `no_alloc` model and host driver for a multi-channel,
//! descriptor-chained DMA engine whose instructions synchronize through
//! completion "bonds".
//!
//! # Architecture
//!
//! The crate is organized into two halves that meet at a register window:
//!
//! 1. **Host driver** ([`driver`]): validated configuration of channels, sinks
//!    and instructions over any [`RegisterBus`], status decoding, and the
//!    double-buffer composer
//! 2. **Engine model** ([`engine`]): the channel, sink and instruction tables,
//!    bond latches and one execution state machine per channel, moving words
//!    through a caller-supplied [`DataBus`]
//!
//! The engine implements [`RegisterBus`] itself, so the same driver code runs
//! against the model in tests and against real hardware through a
//! memory-mapped implementation.
//!
//! ## Register Window
//!
//! | Offset | Register |
//! |---|---|
//! | `0x00` | CONTROL (enable, command-finish latch) |
//! | `0x01` | STATUS (read clears command finished) |
//! | `0x02` / `0x03` | CHANNEL_COUNT / SINK_COUNT |
//! | `0x04 + i` | CHANNEL_CONTROL |
//! | `0x08 + i` | CHANNEL_STATUS |
//! | `0x0C + i` | SINK_CONTROL |
//! | `0x10 + i` | SINK_STATUS |
//! | `0x20 + 0x10 n` | INSTRUCTION words |
//!
//! See [`regs`] for field positions.
//!
//! # Features
//!
//! - `defmt`: Enable defmt formatting for public types
//! - `log`: Engine diagnostics through the `log` facade
//! - `critical-section`: Enable the shared [`sync::SharedDmaEngine`] wrapper
//! - `async`: Add `wait_halted`/`wait_error` futures to the shared wrapper
//!
//! # Example
//!
//! ```ignore
//! use bonded_dma::{DmaController, DmaEngine, InstructionConfig};
//!
//! let mut engine: DmaEngine<2, 2, 8> = DmaEngine::new();
//! let mut dma = DmaController::new(&mut engine);
//! dma.setup();
//!
//! dma.set_channel_sink_addr(0, 0)?;
//! dma.enable_source_address_increment(0, true)?;
//! dma.enable_dest_address_increment(0, true)?;
//! dma.set_instruction(0, &InstructionConfig::new(0x0, 0x10, 0x200))?;
//! dma.enable_dma(true);
//! dma.enable_channel(0, true)?;
//!
//! while engine.is_busy() {
//!     engine.poll(&mut data_bus);
//! }
//! ```

#![no_std]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
// Clippy lint levels mirror the [lints] table in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

// =============================================================================
// Modules
// =============================================================================

pub mod driver;
pub mod engine;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(feature = "critical-section")]
#[cfg_attr(docsrs, doc(cfg(feature = "critical-section")))]
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::bus::RegisterBus;
pub use driver::config::{ControllerConfig, InstructionConfig};
pub use driver::controller::DmaController;
pub use driver::error::{
    ConfigError, ConfigResult, Error, IoError, IoResult, Result, TransferError,
};
pub use driver::status::{ChannelStatus, EngineStatus, SinkStatus};
pub use engine::{
    AddressStep, ChannelId, ChannelState, DataBus, DmaEngine, DmaEngineDefault, DmaEngineLarge,
    EngineConfig, InstructionId, PortError, PortResult, SinkId,
};

// Re-export sync types when critical-section is enabled
#[cfg(feature = "critical-section")]
pub use sync::{SharedDmaEngine, SharedDmaEngineDefault, SharedDmaEngineLarge};

/// Register map of the engine's window.
///
/// Offsets are word offsets; `BIT_*` constants are bit positions and
/// `*_BOT`/`*_TOP` pairs are inclusive field ranges. Most users should go
/// through [`DmaController`] instead.
pub mod regs {
    pub use crate::internal::register::*;
}

/// Sizing and timing defaults.
pub mod constants {
    pub use crate::internal::constants::{
        // Data path
        DEFAULT_QUANTUM_WORDS,
        WORD_BYTES,
        // Table sizes
        DEFAULT_CHANNEL_COUNT,
        DEFAULT_INSTRUCTION_COUNT,
        DEFAULT_SINK_COUNT,
        // Timing
        HALT_POLL_INTERVAL_US,
        HALT_TIMEOUT_US,
    };
}
