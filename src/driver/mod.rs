//! Host-side driver for the bonded DMA engine.
//!
//! Everything the host needs to configure and observe the engine through its
//! register window:
//!
//! - [`bus`] - Register access capability ([`RegisterBus`])
//! - [`config`] - Driver and instruction configuration builders
//! - [`controller`] - The validated configuration interface ([`DmaController`])
//! - [`double_buffer`] - Four-instruction ping-pong composer
//! - [`error`] - Error types and result aliases
//! - [`status`] - Typed status register views
//!
//! # Example
//!
//! ```ignore
//! use bonded_dma::driver::{DmaController, InstructionConfig};
//!
//! let mut dma = DmaController::new(bus);
//! dma.setup();
//! dma.set_instruction(0, &InstructionConfig::new(0x0, 0x10, 0x200))?;
//! ```

pub mod bus;
pub mod config;
pub mod controller;
pub mod double_buffer;
pub mod error;
pub mod status;

pub use bus::RegisterBus;
pub use config::{ControllerConfig, InstructionConfig};
pub use controller::DmaController;
pub use double_buffer::DOUBLE_BUFFER_SLOTS;
pub use error::{
    ConfigError, ConfigResult, Error, IoError, IoResult, Result, TransferError,
};
pub use status::{ChannelStatus, EngineStatus, SinkStatus};
