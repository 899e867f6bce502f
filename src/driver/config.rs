//! Configuration types for the host driver

use crate::internal::constants::{
    DEFAULT_INSTRUCTION_COUNT, HALT_POLL_INTERVAL_US, HALT_TIMEOUT_US,
};
use crate::internal::register::MAX_INSTRUCTIONS;

/// Host driver configuration.
///
/// The engine reports its channel and sink counts through registers, but not
/// the size of its instruction table; that comes from here.
///
/// # Example
///
/// ```ignore
/// let config = ControllerConfig::new()
///     .with_instruction_count(16)
///     .with_halt_timeout_us(50_000);
/// let dma = DmaController::with_config(bus, config)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    /// Instruction slots implemented by the engine
    pub instruction_count: u32,
    /// Default timeout for [`wait_for_channel_halt`](super::DmaController::wait_for_channel_halt)
    pub halt_timeout_us: u32,
    /// Poll interval while waiting for a halt
    pub poll_interval_us: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerConfig {
    /// Create a configuration with default values
    pub const fn new() -> Self {
        Self {
            instruction_count: DEFAULT_INSTRUCTION_COUNT as u32,
            halt_timeout_us: HALT_TIMEOUT_US,
            poll_interval_us: HALT_POLL_INTERVAL_US,
        }
    }

    /// Set the number of instruction slots
    #[must_use]
    pub const fn with_instruction_count(mut self, count: u32) -> Self {
        self.instruction_count = count;
        self
    }

    /// Set the default halt timeout
    #[must_use]
    pub const fn with_halt_timeout_us(mut self, timeout_us: u32) -> Self {
        self.halt_timeout_us = timeout_us;
        self
    }

    /// Set the halt poll interval (0 is treated as 1)
    #[must_use]
    pub const fn with_poll_interval_us(mut self, interval_us: u32) -> Self {
        self.poll_interval_us = if interval_us == 0 { 1 } else { interval_us };
        self
    }

    /// Check the configuration against the register layout
    pub const fn is_valid(&self) -> bool {
        self.instruction_count > 0
            && self.instruction_count as usize <= MAX_INSTRUCTIONS
            && self.poll_interval_us > 0
    }
}

/// All fields of one instruction, for [`set_instruction`](super::DmaController::set_instruction).
///
/// # Example
///
/// ```ignore
/// let inst = InstructionConfig::new(0x0, 0x10, 0x200)
///     .with_next(0)
///     .with_continue(true)
///     .with_src_reset_on_cmd(true);
/// dma.set_instruction(0, &inst)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InstructionConfig {
    /// Source base address
    pub source_address: u64,
    /// Destination base address
    pub dest_address: u64,
    /// Words to move
    pub count: u32,
    /// Instruction loaded after this one when `continue_flag` is set
    pub next_instruction: u32,
    /// Follow `next_instruction` instead of halting
    pub continue_flag: bool,
    /// Restore the source address after each pass
    pub src_reset_on_cmd: bool,
    /// Restore the destination address after each pass
    pub dest_reset_on_cmd: bool,
    /// Wait on this instruction's completion before starting
    pub ingress_bond: Option<u32>,
    /// Signal this instruction on completion
    pub egress_bond: Option<u32>,
}

impl InstructionConfig {
    /// Plain halting transfer of `count` words
    pub const fn new(source_address: u64, dest_address: u64, count: u32) -> Self {
        Self {
            source_address,
            dest_address,
            count,
            next_instruction: 0,
            continue_flag: false,
            src_reset_on_cmd: false,
            dest_reset_on_cmd: false,
            ingress_bond: None,
            egress_bond: None,
        }
    }

    /// Set the next instruction
    #[must_use]
    pub const fn with_next(mut self, next: u32) -> Self {
        self.next_instruction = next;
        self
    }

    /// Follow the chain instead of halting
    #[must_use]
    pub const fn with_continue(mut self, enable: bool) -> Self {
        self.continue_flag = enable;
        self
    }

    /// Restore the source address after each pass
    #[must_use]
    pub const fn with_src_reset_on_cmd(mut self, enable: bool) -> Self {
        self.src_reset_on_cmd = enable;
        self
    }

    /// Restore the destination address after each pass
    #[must_use]
    pub const fn with_dest_reset_on_cmd(mut self, enable: bool) -> Self {
        self.dest_reset_on_cmd = enable;
        self
    }

    /// Gate this instruction on `inst`
    #[must_use]
    pub const fn with_ingress(mut self, inst: u32) -> Self {
        self.ingress_bond = Some(inst);
        self
    }

    /// Release `inst` when this instruction completes
    #[must_use]
    pub const fn with_egress(mut self, inst: u32) -> Self {
        self.egress_bond = Some(inst);
        self
    }
}
