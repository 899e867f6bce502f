//! Internal Implementation Details
//!
//! This module contains implementation details that are not part of the public API.
//! Types in this module may change without notice between minor versions.
//!
//! # Contents
//!
//! - [`register`]: Register offsets, bit positions and bitfield helpers
//! - [`constants`]: Sizing and timing defaults
//!
//! # Stability
//!
//! **WARNING:** This module is `pub(crate)` only. The register map is re-exported
//! read-only through [`crate::regs`] for code that drives the window directly.

pub(crate) mod constants;
pub(crate) mod register;
