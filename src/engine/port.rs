//! Data-side ports of the engine
//!
//! The engine moves words but owns no memory. Whatever sits behind a channel
//! (a memory, a FIFO, a peripheral stream) and behind a sink is reached through
//! a [`DataBus`].

use super::table::{ChannelId, SinkId};

/// Outcome of a single word access on a data port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortError {
    /// The device cannot accept or supply a word right now; retried next tick
    Busy,
    /// The address lies outside the device's addressable range
    OutOfRange,
}

/// Result type alias for data port accesses
pub type PortResult<T> = core::result::Result<T, PortError>;

/// Word-granular access to the devices behind channels and sinks.
///
/// Addresses are byte addresses; every access moves one 32-bit word.
pub trait DataBus {
    /// Read one word from the device feeding `channel`
    fn read_word(&mut self, channel: ChannelId, addr: u64) -> PortResult<u32>;

    /// Write one word to the device behind `sink`
    fn write_word(&mut self, sink: SinkId, addr: u64, word: u32) -> PortResult<()>;
}

impl<T: DataBus + ?Sized> DataBus for &mut T {
    #[inline]
    fn read_word(&mut self, channel: ChannelId, addr: u64) -> PortResult<u32> {
        (**self).read_word(channel, addr)
    }

    #[inline]
    fn write_word(&mut self, sink: SinkId, addr: u64, word: u32) -> PortResult<()> {
        (**self).write_word(sink, addr, word)
    }
}
