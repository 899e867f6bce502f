//! Shared access to the engine model
//!
//! - [`CriticalSectionCell`] - interior mutability behind a critical section
//! - [`SharedDmaEngine`] - engine that several contexts can poll and configure
//! - [`AtomicWaker`] / [`WakerSet`] - waker slots for the async waits
//!   (`async` feature)
//!
//! # Feature Flags
//!
//! - `critical-section`: enables this module
//! - `async`: adds `wait_halted` / `wait_error` to [`SharedDmaEngine`]
//!
//! # Example
//!
//! ```ignore
//! use bonded_dma::sync::SharedDmaEngine;
//!
//! static ENGINE: SharedDmaEngine<2, 2, 8> = SharedDmaEngine::new();
//!
//! // Worker per channel
//! loop {
//!     ENGINE.poll_channel(0, &mut data_bus).ok();
//! }
//! ```

mod primitives;
mod shared;

#[cfg(feature = "async")]
pub use primitives::{AtomicWaker, WakerSet};
pub use primitives::CriticalSectionCell;
pub use shared::{SharedDmaEngine, SharedDmaEngineDefault, SharedDmaEngineLarge};
