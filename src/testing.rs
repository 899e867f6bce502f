//! Testing utilities and mock implementations
//!
//! Host-side stand-ins for the register transport and the devices behind
//! channels and sinks, so the driver and the engine model can be exercised
//! without hardware.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::RefCell;
use std::collections::HashMap;
use std::vec;
use std::vec::Vec;

use crate::driver::bus::RegisterBus;
use crate::engine::{ChannelId, DataBus, PortError, PortResult, SinkId};
use crate::internal::constants::WORD_BYTES;

// =============================================================================
// Mock Register Bus
// =============================================================================

/// Mock register window for testing the host driver without an engine
///
/// Unwritten registers read as zero. Every write is logged.
///
/// # Example
///
/// ```ignore
/// let mut bus = MockRegisterBus::new();
/// bus.set_register(regs::CHANNEL_COUNT, 2);
///
/// let dma = DmaController::new(&mut bus);
/// assert_eq!(dma.channel_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MockRegisterBus {
    /// Register values: addr -> value
    registers: RefCell<HashMap<u32, u32>>,
    /// Record of writes: (addr, value)
    write_log: RefCell<Vec<(u32, u32)>>,
}

impl MockRegisterBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock with the count registers preset
    pub fn with_counts(channels: u32, sinks: u32) -> Self {
        let bus = Self::new();
        bus.set_register(crate::regs::CHANNEL_COUNT, channels);
        bus.set_register(crate::regs::SINK_COUNT, sinks);
        bus
    }

    /// Set a register value without logging a write
    pub fn set_register(&self, addr: u32, value: u32) {
        self.registers.borrow_mut().insert(addr, value);
    }

    /// Current value of a register (for test verification)
    pub fn get_register(&self, addr: u32) -> u32 {
        self.registers.borrow().get(&addr).copied().unwrap_or(0)
    }

    /// All writes made so far
    pub fn get_writes(&self) -> Vec<(u32, u32)> {
        self.write_log.borrow().clone()
    }

    pub fn clear_writes(&self) {
        self.write_log.borrow_mut().clear();
    }
}

impl RegisterBus for MockRegisterBus {
    fn read_register(&mut self, addr: u32) -> u32 {
        self.get_register(addr)
    }

    fn write_register(&mut self, addr: u32, value: u32) {
        self.write_log.borrow_mut().push((addr, value));
        self.set_register(addr, value);
    }
}

// =============================================================================
// Mock Data Bus
// =============================================================================

/// Device wired to a channel or a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Word-addressed memory (index into the bus's memories)
    Memory(usize),
    /// Source yielding 1, 2, 3, ... regardless of address
    Counter,
    /// Sink collecting every word regardless of address (index into the FIFOs)
    Fifo(usize),
    /// Nothing attached; every access is out of range
    Detached,
}

/// Mock data side for driving the engine model in tests
///
/// Channels and sinks are mapped onto memories, counters or FIFOs. A memory
/// can sit behind a sink and a channel at the same time, which is how the
/// double-buffer tests route data through `buf0`/`buf1`.
#[derive(Debug)]
pub struct MemoryBus {
    memories: Vec<Vec<u32>>,
    fifos: Vec<Vec<u32>>,
    channels: Vec<Port>,
    sinks: Vec<Port>,
    counter: u32,
    /// Remaining writes per sink to refuse with `Busy`
    stalls: Vec<u32>,
}

impl MemoryBus {
    /// Bus with every channel and sink detached
    pub fn new(channels: usize, sinks: usize) -> Self {
        Self {
            memories: Vec::new(),
            fifos: Vec::new(),
            channels: vec![Port::Detached; channels],
            sinks: vec![Port::Detached; sinks],
            counter: 0,
            stalls: vec![0; sinks],
        }
    }

    /// Add a zeroed memory of `words` words
    pub fn add_memory(&mut self, words: usize) -> usize {
        self.memories.push(vec![0; words]);
        self.memories.len() - 1
    }

    /// Add a memory holding `contents`
    pub fn add_memory_with(&mut self, contents: Vec<u32>) -> usize {
        self.memories.push(contents);
        self.memories.len() - 1
    }

    pub fn add_fifo(&mut self) -> usize {
        self.fifos.push(Vec::new());
        self.fifos.len() - 1
    }

    pub fn map_channel(&mut self, channel: usize, port: Port) {
        self.channels[channel] = port;
    }

    pub fn map_sink(&mut self, sink: usize, port: Port) {
        self.sinks[sink] = port;
    }

    pub fn memory(&self, index: usize) -> &[u32] {
        &self.memories[index]
    }

    pub fn fifo(&self, index: usize) -> &[u32] {
        &self.fifos[index]
    }

    /// Refuse the next `writes` writes to `sink` with `Busy`
    pub fn stall_sink(&mut self, sink: usize, writes: u32) {
        self.stalls[sink] = writes;
    }

    fn word_index(memory: &[u32], addr: u64) -> PortResult<usize> {
        if addr % WORD_BYTES != 0 {
            return Err(PortError::OutOfRange);
        }
        let index = (addr / WORD_BYTES) as usize;
        if index < memory.len() {
            Ok(index)
        } else {
            Err(PortError::OutOfRange)
        }
    }
}

impl DataBus for MemoryBus {
    fn read_word(&mut self, channel: ChannelId, addr: u64) -> PortResult<u32> {
        match self.channels.get(channel.index()).copied() {
            Some(Port::Memory(m)) => {
                let memory = &self.memories[m];
                Self::word_index(memory, addr).map(|i| memory[i])
            }
            Some(Port::Counter) => {
                self.counter += 1;
                Ok(self.counter)
            }
            Some(Port::Fifo(_) | Port::Detached) | None => Err(PortError::OutOfRange),
        }
    }

    fn write_word(&mut self, sink: SinkId, addr: u64, word: u32) -> PortResult<()> {
        if let Some(stall) = self.stalls.get_mut(sink.index()) {
            if *stall > 0 {
                *stall -= 1;
                return Err(PortError::Busy);
            }
        }
        match self.sinks.get(sink.index()).copied() {
            Some(Port::Memory(m)) => {
                let memory = &mut self.memories[m];
                let i = Self::word_index(memory, addr)?;
                memory[i] = word;
                Ok(())
            }
            Some(Port::Fifo(f)) => {
                self.fifos[f].push(word);
                Ok(())
            }
            Some(Port::Counter | Port::Detached) | None => Err(PortError::OutOfRange),
        }
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Mock delay for testing without actual timing
///
/// Records delays for verification without actually waiting.
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Total nanoseconds delayed
    total_ns: RefCell<u64>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total nanoseconds that were "delayed"
    pub fn total_ns(&self) -> u64 {
        *self.total_ns.borrow()
    }

    pub fn total_us(&self) -> u64 {
        self.total_ns() / 1_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        *self.total_ns.borrow_mut() += ns as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::table::TableIndex;

    #[test]
    fn mock_register_bus_logs_writes() {
        let mut bus = MockRegisterBus::with_counts(2, 2);
        assert_eq!(bus.read_register(crate::regs::CHANNEL_COUNT), 2);
        assert!(bus.get_writes().is_empty());

        bus.write_register(0x04, 0x11);
        assert_eq!(bus.get_register(0x04), 0x11);
        assert_eq!(bus.get_writes(), vec![(0x04, 0x11)]);
        bus.clear_writes();
        assert!(bus.get_writes().is_empty());
    }

    #[test]
    fn memory_bus_routes_ports() {
        let mut bus = MemoryBus::new(1, 2);
        let src = bus.add_memory_with(vec![7, 8, 9]);
        let fifo = bus.add_fifo();
        bus.map_channel(0, Port::Memory(src));
        bus.map_sink(1, Port::Fifo(fifo));

        let ch = ChannelId::from_checked(0);
        assert_eq!(bus.read_word(ch, 4), Ok(8));
        assert_eq!(bus.read_word(ch, 12), Err(PortError::OutOfRange));
        assert_eq!(bus.read_word(ch, 2), Err(PortError::OutOfRange));

        bus.stall_sink(1, 1);
        assert_eq!(bus.write_word(SinkId::from_checked(1), 0, 5), Err(PortError::Busy));
        assert_eq!(bus.write_word(SinkId::from_checked(1), 0, 5), Ok(()));
        assert_eq!(bus.fifo(fifo), &[5]);
        assert_eq!(
            bus.write_word(SinkId::from_checked(0), 0, 5),
            Err(PortError::OutOfRange)
        );
    }

    #[test]
    fn counter_port_counts_from_one() {
        let mut bus = MemoryBus::new(1, 0);
        bus.map_channel(0, Port::Counter);
        let ch = ChannelId::from_checked(0);
        assert_eq!(bus.read_word(ch, 0), Ok(1));
        assert_eq!(bus.read_word(ch, 0), Ok(2));
    }
}
