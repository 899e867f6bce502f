//! Register map of the DMA engine
//!
//! Addresses are word offsets into the engine's register window. Bit positions
//! are 0-indexed; multi-bit fields are described by inclusive `(BOT, TOP)` pairs.

// =============================================================================
// Global Registers
// =============================================================================

/// Global control register
pub const CONTROL: u32 = 0x00;
/// Global status register (read-only)
pub const STATUS: u32 = 0x01;
/// Number of channels implemented (read-only)
pub const CHANNEL_COUNT: u32 = 0x02;
/// Number of sinks implemented (read-only)
pub const SINK_COUNT: u32 = 0x03;

/// CONTROL: global engine enable
pub const BIT_CONTROL_ENABLE: u32 = 0;
/// CONTROL: latch STATUS command-finished when a channel halts
pub const BIT_CONTROL_INTERRUPT_CMD_FIN: u32 = 1;

/// STATUS: at least one channel is running or waiting on a bond
pub const BIT_STATUS_BUSY: u32 = 0;
/// STATUS: a channel or sink has a latched transfer error
pub const BIT_STATUS_ERROR: u32 = 1;
/// STATUS: a channel halted while command-finish reporting was enabled (clear on read)
pub const BIT_STATUS_CMD_FINISHED: u32 = 2;
/// STATUS: per-channel active mask, low bit
pub const BIT_STATUS_ACTIVE_BOT: u32 = 8;
/// STATUS: per-channel active mask, high bit
pub const BIT_STATUS_ACTIVE_TOP: u32 = 11;

// =============================================================================
// Channel Registers
// =============================================================================

/// Base of the per-channel control registers
pub const CHANNEL_CONTROL_BASE: u32 = 0x04;
/// Base of the per-channel status registers (read-only)
pub const CHANNEL_STATUS_BASE: u32 = 0x08;

/// CHANNEL_CONTROL: channel enable
pub const BIT_CHANNEL_ENABLE: u32 = 0;
/// CHANNEL_CONTROL: source address increments after each word
pub const BIT_CHANNEL_SRC_ADDR_INC: u32 = 1;
/// CHANNEL_CONTROL: source address decrements after each word
pub const BIT_CHANNEL_SRC_ADDR_DEC: u32 = 2;
/// CHANNEL_CONTROL: sink address, low bit
pub const BIT_SINK_ADDR_BOT: u32 = 8;
/// CHANNEL_CONTROL: sink address, high bit
pub const BIT_SINK_ADDR_TOP: u32 = 10;
/// CHANNEL_CONTROL: instruction pointer, low bit
pub const BIT_INST_PTR_BOT: u32 = 16;
/// CHANNEL_CONTROL: instruction pointer, high bit
pub const BIT_INST_PTR_TOP: u32 = 19;

/// CHANNEL_STATUS: channel is running, continuing or waiting on a bond
pub const BIT_CHANNEL_STATUS_ACTIVE: u32 = 0;
/// CHANNEL_STATUS: channel is blocked on an ingress bond
pub const BIT_CHANNEL_STATUS_WAITING: u32 = 1;
/// CHANNEL_STATUS: channel reached the end of its instruction chain
pub const BIT_CHANNEL_STATUS_HALTED: u32 = 2;
/// CHANNEL_STATUS: a transfer error stalled the channel
pub const BIT_CHANNEL_STATUS_ERROR: u32 = 3;
/// CHANNEL_STATUS: both source increment and decrement were set when started
pub const BIT_CHANNEL_STATUS_STEP_CONFLICT: u32 = 4;
/// CHANNEL_STATUS: currently loaded instruction, low bit
pub const BIT_CHANNEL_STATUS_INST_BOT: u32 = 16;
/// CHANNEL_STATUS: currently loaded instruction, high bit
pub const BIT_CHANNEL_STATUS_INST_TOP: u32 = 19;

// =============================================================================
// Sink Registers
// =============================================================================

/// Base of the per-sink control registers
pub const SINK_CONTROL_BASE: u32 = 0x0C;
/// Base of the per-sink status registers
pub const SINK_STATUS_BASE: u32 = 0x10;

/// SINK_CONTROL: destination address decrements after each word
pub const BIT_SINK_DEST_ADDR_DEC: u32 = 1;
/// SINK_CONTROL: destination address increments after each word
pub const BIT_SINK_DEST_ADDR_INC: u32 = 2;
/// SINK_CONTROL: hold completion signals until a full quantum is written
pub const BIT_SINK_DEST_DATA_QUANTUM: u32 = 3;

/// SINK_STATUS: a transfer error targeted this sink (write 1 to clear)
pub const BIT_SINK_STATUS_ERROR: u32 = 0;
/// SINK_STATUS: a partial quantum is buffered
pub const BIT_SINK_STATUS_QUANTUM_PENDING: u32 = 1;

// =============================================================================
// Instruction Registers
// =============================================================================

/// Base of the instruction table
pub const INST_BASE: u32 = 0x20;
/// Register stride between instructions
pub const INST_OFFSET: u32 = 0x10;

/// Source address, low word
pub const INST_SRC_ADDR_LOW: u32 = 0x00;
/// Source address, high word
pub const INST_SRC_ADDR_HIGH: u32 = 0x01;
/// Destination address, low word
pub const INST_DEST_ADDR_LOW: u32 = 0x02;
/// Destination address, high word
pub const INST_DEST_ADDR_HIGH: u32 = 0x03;
/// Number of words to move
pub const INST_COUNT: u32 = 0x04;
/// Instruction control word
pub const INST_CNTRL: u32 = 0x05;

/// Control word: restore the source address to its base after each pass
pub const BIT_INST_SRC_RST_ON_CMD: u32 = 2;
/// Control word: restore the destination address to its base after each pass
pub const BIT_INST_DEST_RST_ON_CMD: u32 = 7;
/// Control word: wait on the ingress-bonded instruction before starting
pub const BIT_INST_BOND_INGRESS: u32 = 8;
/// Control word: signal the egress-bonded instruction on completion
pub const BIT_INST_BOND_EGRESS: u32 = 9;
/// Control word: load `next` after completion instead of halting
pub const BIT_INST_CONTINUE: u32 = 11;
/// Control word: next instruction, low bit
pub const BIT_INST_NEXT_BOT: u32 = 16;
/// Control word: next instruction, high bit
pub const BIT_INST_NEXT_TOP: u32 = 19;
/// Control word: ingress bond address, low bit
pub const BIT_INST_BOND_ADDR_IN_BOT: u32 = 24;
/// Control word: ingress bond address, high bit
pub const BIT_INST_BOND_ADDR_IN_TOP: u32 = 27;
/// Control word: egress bond address, low bit
pub const BIT_INST_BOND_ADDR_OUT_BOT: u32 = 28;
/// Control word: egress bond address, high bit
pub const BIT_INST_BOND_ADDR_OUT_TOP: u32 = 31;

// =============================================================================
// Window Limits
// =============================================================================

/// Channels addressable by the register window (0x04..0x08)
pub const MAX_CHANNELS: usize = (CHANNEL_STATUS_BASE - CHANNEL_CONTROL_BASE) as usize;
/// Sinks addressable by the register window (0x0C..0x10)
pub const MAX_SINKS: usize = (SINK_STATUS_BASE - SINK_CONTROL_BASE) as usize;
/// Instructions addressable by a 4-bit instruction field
pub const MAX_INSTRUCTIONS: usize = 1 << (BIT_INST_NEXT_TOP - BIT_INST_NEXT_BOT + 1);

// =============================================================================
// Address Helpers
// =============================================================================

/// Address of `CHANNEL_CONTROL[channel]`
#[inline(always)]
pub const fn channel_control(channel: u32) -> u32 {
    CHANNEL_CONTROL_BASE + channel
}

/// Address of `CHANNEL_STATUS[channel]`
#[inline(always)]
pub const fn channel_status(channel: u32) -> u32 {
    CHANNEL_STATUS_BASE + channel
}

/// Address of `SINK_CONTROL[sink]`
#[inline(always)]
pub const fn sink_control(sink: u32) -> u32 {
    SINK_CONTROL_BASE + sink
}

/// Address of `SINK_STATUS[sink]`
#[inline(always)]
pub const fn sink_status(sink: u32) -> u32 {
    SINK_STATUS_BASE + sink
}

/// Address of word `word` of instruction `inst`
#[inline(always)]
pub const fn instruction(inst: u32, word: u32) -> u32 {
    INST_BASE + INST_OFFSET * inst + word
}

// =============================================================================
// Bitfield Helpers
// =============================================================================

/// Mask covering bits `bot..=top`
#[inline(always)]
pub const fn field_mask(bot: u32, top: u32) -> u32 {
    let width = top - bot + 1;
    if width >= 32 {
        u32::MAX
    } else {
        ((1u32 << width) - 1) << bot
    }
}

/// Extract bits `bot..=top` of `value`
#[inline(always)]
pub const fn get_field(value: u32, bot: u32, top: u32) -> u32 {
    (value & field_mask(bot, top)) >> bot
}

/// Replace bits `bot..=top` of `value` with `field` (excess high bits dropped)
#[inline(always)]
pub const fn set_field(value: u32, bot: u32, top: u32, field: u32) -> u32 {
    let mask = field_mask(bot, top);
    (value & !mask) | ((field << bot) & mask)
}

/// Test a single bit
#[inline(always)]
pub const fn bit_is_set(value: u32, bit: u32) -> bool {
    (value >> bit) & 1 != 0
}

/// Set or clear a single bit
#[inline(always)]
pub const fn with_bit(value: u32, bit: u32, enable: bool) -> u32 {
    if enable {
        value | (1 << bit)
    } else {
        value & !(1 << bit)
    }
}
