//! Register access capability
//!
//! The host driver never touches the engine directly; every configuration call
//! goes through a [`RegisterBus`]. The transport behind it (AXI-Lite, Wishbone,
//! a UART bridge, or the in-crate engine model) is out of scope.

use crate::internal::register::{bit_is_set, get_field, set_field, with_bit};

/// Word-addressed register window of the DMA engine.
///
/// Implementors provide the two raw accessors; the bit and field helpers are
/// read-modify-write sequences built on top of them.
pub trait RegisterBus {
    /// Read the 32-bit register at word offset `addr`
    fn read_register(&mut self, addr: u32) -> u32;

    /// Write the 32-bit register at word offset `addr`
    fn write_register(&mut self, addr: u32, value: u32);

    /// Set or clear a single bit (read-modify-write)
    fn enable_register_bit(&mut self, addr: u32, bit: u32, enable: bool) {
        let value = self.read_register(addr);
        self.write_register(addr, with_bit(value, bit, enable));
    }

    /// Check whether a single bit is set
    fn is_register_bit_set(&mut self, addr: u32, bit: u32) -> bool {
        bit_is_set(self.read_register(addr), bit)
    }

    /// Read the inclusive bit range `bot..=top`
    fn read_register_field(&mut self, addr: u32, bot: u32, top: u32) -> u32 {
        get_field(self.read_register(addr), bot, top)
    }

    /// Replace the inclusive bit range `bot..=top` (read-modify-write)
    fn write_register_field(&mut self, addr: u32, bot: u32, top: u32, field: u32) {
        let value = self.read_register(addr);
        self.write_register(addr, set_field(value, bot, top, field));
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    #[inline]
    fn read_register(&mut self, addr: u32) -> u32 {
        (**self).read_register(addr)
    }

    #[inline]
    fn write_register(&mut self, addr: u32, value: u32) {
        (**self).write_register(addr, value);
    }
}
