//! Fixed-size hardware tables with bounds-checked indices.
//!
//! Channels, sinks and instructions live in flat arrays owned by the engine.
//! Entries refer to each other only through the index newtypes below, and an
//! index can only be minted by the table it belongs to, so every lookup is in
//! range by construction.

use core::marker::PhantomData;

use crate::driver::error::{ConfigError, ConfigResult};
use crate::internal::register::{
    BIT_CHANNEL_ENABLE, BIT_CHANNEL_SRC_ADDR_DEC, BIT_CHANNEL_SRC_ADDR_INC,
    BIT_INST_BOND_ADDR_IN_BOT, BIT_INST_BOND_ADDR_IN_TOP, BIT_INST_BOND_ADDR_OUT_BOT,
    BIT_INST_BOND_ADDR_OUT_TOP, BIT_INST_BOND_EGRESS, BIT_INST_BOND_INGRESS, BIT_INST_CONTINUE,
    BIT_INST_DEST_RST_ON_CMD, BIT_INST_NEXT_BOT, BIT_INST_NEXT_TOP, BIT_INST_PTR_BOT,
    BIT_INST_PTR_TOP, BIT_INST_SRC_RST_ON_CMD, BIT_SINK_ADDR_BOT, BIT_SINK_ADDR_TOP,
    BIT_SINK_DEST_ADDR_DEC, BIT_SINK_DEST_ADDR_INC, BIT_SINK_DEST_DATA_QUANTUM, bit_is_set,
    get_field,
};

// =============================================================================
// Index Newtypes
// =============================================================================

/// Index type minted by a [`Table`].
pub(crate) trait TableIndex: Copy {
    /// Wrap an index already checked against the table size
    fn from_checked(index: u8) -> Self;
    /// Position in the table
    fn index(self) -> usize;
}

macro_rules! table_index {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(u8);

        impl $name {
            /// Position in the owning table
            #[inline(always)]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Raw register encoding of this index
            #[inline(always)]
            pub const fn raw(self) -> u32 {
                self.0 as u32
            }
        }

        impl TableIndex for $name {
            #[inline(always)]
            fn from_checked(index: u8) -> Self {
                Self(index)
            }

            #[inline(always)]
            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

table_index!(ChannelId, "Index of a channel in the channel table");
table_index!(SinkId, "Index of a sink in the sink table");
table_index!(InstructionId, "Index of an instruction in the instruction table");

// =============================================================================
// Table
// =============================================================================

/// Flat array of `N` entries addressed by the index type `I`.
pub(crate) struct Table<T, I, const N: usize> {
    entries: [T; N],
    _index: PhantomData<I>,
}

impl<T, I: TableIndex, const N: usize> Table<T, I, N> {
    /// Create a table from an existing array. Const-compatible.
    pub const fn from_array(entries: [T; N]) -> Self {
        Self {
            entries,
            _index: PhantomData,
        }
    }

    /// Validate a raw index from a register or host call.
    #[inline]
    pub fn id(&self, raw: u32) -> ConfigResult<I> {
        if (raw as usize) < N {
            Ok(I::from_checked(raw as u8))
        } else {
            Err(ConfigError::OutOfRange)
        }
    }

    /// Entry at a checked index
    #[inline(always)]
    pub fn get(&self, id: I) -> &T {
        &self.entries[id.index()]
    }

    /// Mutable entry at a checked index
    #[inline(always)]
    pub fn get_mut(&mut self, id: I) -> &mut T {
        &mut self.entries[id.index()]
    }

    /// Iterate over `(index, entry)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (I::from_checked(i as u8), entry))
    }
}

// =============================================================================
// Address Stepping
// =============================================================================

/// How an address moves after each transferred word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressStep {
    /// Address stays put (FIFO-style endpoint)
    #[default]
    Hold,
    /// Address moves up by one word
    Increment,
    /// Address moves down by one word
    Decrement,
    /// Increment and decrement both requested; the address is held and the
    /// channel reports the conflict in its status register
    Conflict,
}

impl AddressStep {
    /// Decode an increment/decrement flag pair
    pub const fn from_flags(increment: bool, decrement: bool) -> Self {
        match (increment, decrement) {
            (false, false) => AddressStep::Hold,
            (true, false) => AddressStep::Increment,
            (false, true) => AddressStep::Decrement,
            (true, true) => AddressStep::Conflict,
        }
    }

    /// Apply one step of `width` bytes
    #[inline]
    pub const fn apply(self, addr: u64, width: u64) -> u64 {
        match self {
            AddressStep::Increment => addr.wrapping_add(width),
            AddressStep::Decrement => addr.wrapping_sub(width),
            AddressStep::Hold | AddressStep::Conflict => addr,
        }
    }
}

// =============================================================================
// Entries
// =============================================================================

/// One source-side actor, stored as its `CHANNEL_CONTROL` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Channel {
    control: u32,
}

impl Channel {
    /// Disabled channel pointing at sink 0 and instruction 0
    pub const fn new() -> Self {
        Self { control: 0 }
    }

    /// Raw `CHANNEL_CONTROL` word
    pub const fn control(&self) -> u32 {
        self.control
    }

    pub(crate) fn set_control(&mut self, value: u32) {
        self.control = value;
    }

    /// Channel enable bit
    pub const fn enabled(&self) -> bool {
        bit_is_set(self.control, BIT_CHANNEL_ENABLE)
    }

    /// Source address stepping policy
    pub const fn source_step(&self) -> AddressStep {
        AddressStep::from_flags(
            bit_is_set(self.control, BIT_CHANNEL_SRC_ADDR_INC),
            bit_is_set(self.control, BIT_CHANNEL_SRC_ADDR_DEC),
        )
    }

    /// Raw sink address field
    pub const fn sink_raw(&self) -> u32 {
        get_field(self.control, BIT_SINK_ADDR_BOT, BIT_SINK_ADDR_TOP)
    }

    /// Raw instruction pointer field
    pub const fn instruction_ptr_raw(&self) -> u32 {
        get_field(self.control, BIT_INST_PTR_BOT, BIT_INST_PTR_TOP)
    }
}

/// One data destination, stored as its `SINK_CONTROL` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sink {
    control: u32,
}

impl Sink {
    /// Sink with a fixed destination address and no quantum
    pub const fn new() -> Self {
        Self { control: 0 }
    }

    /// Raw `SINK_CONTROL` word
    pub const fn control(&self) -> u32 {
        self.control
    }

    pub(crate) fn set_control(&mut self, value: u32) {
        self.control = value;
    }

    /// Destination address stepping policy
    pub const fn dest_step(&self) -> AddressStep {
        AddressStep::from_flags(
            bit_is_set(self.control, BIT_SINK_DEST_ADDR_INC),
            bit_is_set(self.control, BIT_SINK_DEST_ADDR_DEC),
        )
    }

    /// Completion is held until a full quantum has been written
    pub const fn respects_quantum(&self) -> bool {
        bit_is_set(self.control, BIT_SINK_DEST_DATA_QUANTUM)
    }
}

/// One descriptor in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Instruction {
    /// Configured source address
    pub source_address: u64,
    /// Configured destination address
    pub dest_address: u64,
    /// Number of words to move
    pub count: u32,
    /// Raw control word
    pub control: u32,
}

impl Instruction {
    /// Zeroed instruction (halts after moving nothing)
    pub const fn new() -> Self {
        Self {
            source_address: 0,
            dest_address: 0,
            count: 0,
            control: 0,
        }
    }

    /// Load `next` after completion instead of halting
    pub const fn continues(&self) -> bool {
        bit_is_set(self.control, BIT_INST_CONTINUE)
    }

    /// Raw next-instruction field
    pub const fn next_raw(&self) -> u32 {
        get_field(self.control, BIT_INST_NEXT_BOT, BIT_INST_NEXT_TOP)
    }

    /// Restore the source cursor to its base after each pass
    pub const fn src_reset_on_cmd(&self) -> bool {
        bit_is_set(self.control, BIT_INST_SRC_RST_ON_CMD)
    }

    /// Restore the destination cursor to its base after each pass
    pub const fn dest_reset_on_cmd(&self) -> bool {
        bit_is_set(self.control, BIT_INST_DEST_RST_ON_CMD)
    }

    /// Raw ingress bond target, if the ingress bond is enabled
    pub const fn ingress_raw(&self) -> Option<u32> {
        if bit_is_set(self.control, BIT_INST_BOND_INGRESS) {
            Some(get_field(
                self.control,
                BIT_INST_BOND_ADDR_IN_BOT,
                BIT_INST_BOND_ADDR_IN_TOP,
            ))
        } else {
            None
        }
    }

    /// Raw egress bond target, if the egress bond is enabled
    pub const fn egress_raw(&self) -> Option<u32> {
        if bit_is_set(self.control, BIT_INST_BOND_EGRESS) {
            Some(get_field(
                self.control,
                BIT_INST_BOND_ADDR_OUT_BOT,
                BIT_INST_BOND_ADDR_OUT_TOP,
            ))
        } else {
            None
        }
    }
}
