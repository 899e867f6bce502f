//! Status register decoding
//!
//! Typed views of the STATUS, CHANNEL_STATUS and SINK_STATUS registers.

use crate::internal::register::{
    BIT_CHANNEL_STATUS_ACTIVE, BIT_CHANNEL_STATUS_ERROR, BIT_CHANNEL_STATUS_HALTED,
    BIT_CHANNEL_STATUS_INST_BOT, BIT_CHANNEL_STATUS_INST_TOP, BIT_CHANNEL_STATUS_STEP_CONFLICT,
    BIT_CHANNEL_STATUS_WAITING, BIT_SINK_STATUS_ERROR, BIT_SINK_STATUS_QUANTUM_PENDING,
    BIT_STATUS_ACTIVE_BOT, BIT_STATUS_ACTIVE_TOP, BIT_STATUS_BUSY, BIT_STATUS_CMD_FINISHED,
    BIT_STATUS_ERROR, bit_is_set, get_field, set_field, with_bit,
};

// =============================================================================
// Engine Status
// =============================================================================

/// Global engine status.
///
/// Reading STATUS clears the command-finished latch, so keep the decoded value
/// rather than reading the register twice.
///
/// # Example
///
/// ```ignore
/// let status = dma.engine_status();
/// if status.command_finished {
///     // a channel reached the end of its chain
/// }
/// if status.error {
///     // inspect channel_status()/sink_status() to find the culprit
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineStatus {
    /// At least one channel is active
    pub busy: bool,
    /// A channel or sink has a latched transfer error
    pub error: bool,
    /// A channel halted with command-finish reporting enabled
    pub command_finished: bool,
    /// Bit `n` set when channel `n` is active
    pub active_channels: u8,
}

impl EngineStatus {
    /// Create from raw STATUS register value
    #[inline]
    pub fn from_raw(status: u32) -> Self {
        Self {
            busy: bit_is_set(status, BIT_STATUS_BUSY),
            error: bit_is_set(status, BIT_STATUS_ERROR),
            command_finished: bit_is_set(status, BIT_STATUS_CMD_FINISHED),
            active_channels: get_field(status, BIT_STATUS_ACTIVE_BOT, BIT_STATUS_ACTIVE_TOP) as u8,
        }
    }

    /// Convert back to the raw register encoding
    #[inline]
    pub fn to_raw(&self) -> u32 {
        let mut val = 0u32;
        val = with_bit(val, BIT_STATUS_BUSY, self.busy);
        val = with_bit(val, BIT_STATUS_ERROR, self.error);
        val = with_bit(val, BIT_STATUS_CMD_FINISHED, self.command_finished);
        set_field(
            val,
            BIT_STATUS_ACTIVE_BOT,
            BIT_STATUS_ACTIVE_TOP,
            self.active_channels as u32,
        )
    }

    /// Check whether a given channel is active
    #[inline]
    pub fn is_channel_active(&self, channel: u32) -> bool {
        channel < 8 && (self.active_channels >> channel) & 1 != 0
    }
}

// =============================================================================
// Channel Status
// =============================================================================

/// Per-channel execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStatus {
    /// Running, waiting on a bond or loading the next instruction
    pub active: bool,
    /// Blocked on an ingress bond
    pub waiting_on_bond: bool,
    /// Reached the end of its chain
    pub halted: bool,
    /// A transfer error stalled the channel
    pub error: bool,
    /// Source increment and decrement were both set when the channel started
    pub step_conflict: bool,
    /// Instruction currently (or last) loaded
    pub instruction: u32,
}

impl ChannelStatus {
    /// Create from raw CHANNEL_STATUS register value
    #[inline]
    pub fn from_raw(status: u32) -> Self {
        Self {
            active: bit_is_set(status, BIT_CHANNEL_STATUS_ACTIVE),
            waiting_on_bond: bit_is_set(status, BIT_CHANNEL_STATUS_WAITING),
            halted: bit_is_set(status, BIT_CHANNEL_STATUS_HALTED),
            error: bit_is_set(status, BIT_CHANNEL_STATUS_ERROR),
            step_conflict: bit_is_set(status, BIT_CHANNEL_STATUS_STEP_CONFLICT),
            instruction: get_field(status, BIT_CHANNEL_STATUS_INST_BOT, BIT_CHANNEL_STATUS_INST_TOP),
        }
    }

    /// Convert back to the raw register encoding
    #[inline]
    pub fn to_raw(&self) -> u32 {
        let mut val = 0u32;
        val = with_bit(val, BIT_CHANNEL_STATUS_ACTIVE, self.active);
        val = with_bit(val, BIT_CHANNEL_STATUS_WAITING, self.waiting_on_bond);
        val = with_bit(val, BIT_CHANNEL_STATUS_HALTED, self.halted);
        val = with_bit(val, BIT_CHANNEL_STATUS_ERROR, self.error);
        val = with_bit(val, BIT_CHANNEL_STATUS_STEP_CONFLICT, self.step_conflict);
        set_field(
            val,
            BIT_CHANNEL_STATUS_INST_BOT,
            BIT_CHANNEL_STATUS_INST_TOP,
            self.instruction,
        )
    }
}

// =============================================================================
// Sink Status
// =============================================================================

/// Per-sink status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SinkStatus {
    /// A transfer error targeted this sink
    pub error: bool,
    /// A partial quantum (or a completion parked behind it) is outstanding
    pub quantum_pending: bool,
}

impl SinkStatus {
    /// Create from raw SINK_STATUS register value
    #[inline]
    pub fn from_raw(status: u32) -> Self {
        Self {
            error: bit_is_set(status, BIT_SINK_STATUS_ERROR),
            quantum_pending: bit_is_set(status, BIT_SINK_STATUS_QUANTUM_PENDING),
        }
    }

    /// Convert back to the raw register encoding (write-1-to-clear for `error`)
    #[inline]
    pub fn to_raw(&self) -> u32 {
        let val = with_bit(0, BIT_SINK_STATUS_ERROR, self.error);
        with_bit(val, BIT_SINK_STATUS_QUANTUM_PENDING, self.quantum_pending)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
