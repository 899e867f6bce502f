//! Behavioral model of the DMA engine
//!
//! [`DmaEngine`] owns the channel, sink and instruction tables, the bond
//! latches and one [`ChannelState`] machine per channel. The host reaches it
//! only through its register window ([`RegisterBus`](crate::RegisterBus)); data
//! moves through a caller-supplied [`DataBus`].
//!
//! # Scheduling
//!
//! Channels are cooperative actors. [`DmaEngine::poll`] gives every channel one
//! tick; [`DmaEngine::poll_channel`] ticks a single channel so each channel can
//! be driven from its own task or thread (see `SharedDmaEngine` with the
//! `critical-section` feature). A tick moves at most one word, so disabling a
//! channel between ticks always lands on a unit boundary.
//!
//! # Type Parameters
//! * `CHANNELS` - Number of channels (at most 4)
//! * `SINKS` - Number of sinks (at most 4)
//! * `INSTRUCTIONS` - Number of instruction slots (at most 16)

mod bond;
mod config;
mod port;
mod regfile;
mod runner;
pub(crate) mod table;

pub use config::EngineConfig;
pub use port::{DataBus, PortError, PortResult};
pub use runner::ChannelState;
pub use table::{AddressStep, ChannelId, InstructionId, SinkId};

use bond::{BondLatches, QuantumGate};
use runner::ChannelRunner;
use table::{Channel, Instruction, Sink, Table};

use crate::driver::error::{ConfigResult, TransferError};
use crate::internal::constants::{
    DEFAULT_CHANNEL_COUNT, DEFAULT_INSTRUCTION_COUNT, DEFAULT_SINK_COUNT,
};
use crate::internal::register::{
    BIT_CONTROL_ENABLE, MAX_CHANNELS, MAX_INSTRUCTIONS, MAX_SINKS, bit_is_set,
};

/// Live source/destination addresses of one instruction slot
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    src: u64,
    dest: u64,
}

impl Cursor {
    const fn new() -> Self {
        Self { src: 0, dest: 0 }
    }
}

/// DMA engine model with statically sized tables.
pub struct DmaEngine<const CHANNELS: usize, const SINKS: usize, const INSTRUCTIONS: usize> {
    config: EngineConfig,
    /// Raw CONTROL register
    control: u32,
    /// Latched command-finished flag (cleared by reading STATUS)
    cmd_finished: bool,
    channels: Table<Channel, ChannelId, CHANNELS>,
    sinks: Table<Sink, SinkId, SINKS>,
    instructions: Table<Instruction, InstructionId, INSTRUCTIONS>,
    cursors: [Cursor; INSTRUCTIONS],
    latches: BondLatches<INSTRUCTIONS>,
    gates: [QuantumGate<INSTRUCTIONS>; SINKS],
    sink_errors: [Option<TransferError>; SINKS],
    runners: [ChannelRunner; CHANNELS],
}

impl<const CHANNELS: usize, const SINKS: usize, const INSTRUCTIONS: usize>
    DmaEngine<CHANNELS, SINKS, INSTRUCTIONS>
{
    const SIZES_FIT_REGISTER_WINDOW: () = assert!(
        CHANNELS <= MAX_CHANNELS && SINKS <= MAX_SINKS && INSTRUCTIONS <= MAX_INSTRUCTIONS,
        "table sizes exceed the register window"
    );

    /// Create an engine with the default configuration (const, suitable for
    /// static initialization).
    pub const fn new() -> Self {
        Self::with_config(EngineConfig::new())
    }

    /// Create an engine with an explicit configuration.
    pub const fn with_config(config: EngineConfig) -> Self {
        let () = Self::SIZES_FIT_REGISTER_WINDOW;
        Self {
            config,
            control: 0,
            cmd_finished: false,
            channels: Table::from_array([const { Channel::new() }; CHANNELS]),
            sinks: Table::from_array([const { Sink::new() }; SINKS]),
            instructions: Table::from_array([const { Instruction::new() }; INSTRUCTIONS]),
            cursors: [const { Cursor::new() }; INSTRUCTIONS],
            latches: BondLatches::new(),
            gates: [const { QuantumGate::new() }; SINKS],
            sink_errors: [None; SINKS],
            runners: [const { ChannelRunner::new() }; CHANNELS],
        }
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of channels
    pub const fn channel_count(&self) -> usize {
        CHANNELS
    }

    /// Number of sinks
    pub const fn sink_count(&self) -> usize {
        SINKS
    }

    /// Number of instruction slots
    pub const fn instruction_count(&self) -> usize {
        INSTRUCTIONS
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Global enable bit of the CONTROL register
    pub fn is_enabled(&self) -> bool {
        bit_is_set(self.control, BIT_CONTROL_ENABLE)
    }

    /// Give every channel one tick. Does nothing while globally disabled.
    pub fn poll<B: DataBus + ?Sized>(&mut self, bus: &mut B) {
        if !self.is_enabled() {
            return;
        }
        for index in 0..CHANNELS {
            if let Ok(channel) = self.channels.id(index as u32) {
                self.tick(channel, bus);
            }
        }
    }

    /// Give a single channel one tick.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is not a valid channel index.
    pub fn poll_channel<B: DataBus + ?Sized>(
        &mut self,
        channel: u32,
        bus: &mut B,
    ) -> ConfigResult<()> {
        let channel = self.channels.id(channel)?;
        if self.is_enabled() {
            self.tick(channel, bus);
        }
        Ok(())
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Execution state of a channel
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is not a valid channel index.
    pub fn channel_state(&self, channel: u32) -> ConfigResult<ChannelState> {
        let channel = self.channels.id(channel)?;
        Ok(self.runners[channel.index()].state)
    }

    /// Latched transfer error of a channel, if any
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is not a valid channel index.
    pub fn channel_error(&self, channel: u32) -> ConfigResult<Option<TransferError>> {
        let channel = self.channels.id(channel)?;
        Ok(self.runners[channel.index()].error)
    }

    /// Latched transfer error of a sink, if any
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is not a valid sink index.
    pub fn sink_error(&self, sink: u32) -> ConfigResult<Option<TransferError>> {
        let sink = self.sinks.id(sink)?;
        Ok(self.sink_errors[sink.index()])
    }

    /// Completion tokens waiting for an instruction
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is not a valid instruction index.
    pub fn bond_tokens(&self, inst: u32) -> ConfigResult<u32> {
        let inst = self.instructions.id(inst)?;
        Ok(self.latches.pending(inst))
    }

    /// At least one channel is running, waiting or about to load
    pub fn is_busy(&self) -> bool {
        self.runners.iter().any(|r| r.state.is_active())
    }

    /// At least one channel or sink holds a transfer error
    pub fn has_error(&self) -> bool {
        self.runners.iter().any(|r| r.error.is_some()) || self.sink_errors.iter().any(Option::is_some)
    }
}

impl<const CHANNELS: usize, const SINKS: usize, const INSTRUCTIONS: usize> Default
    for DmaEngine<CHANNELS, SINKS, INSTRUCTIONS>
{
    fn default() -> Self {
        Self::new()
    }
}

/// Engine with the default table sizes (2 channels, 2 sinks, 8 instructions).
pub type DmaEngineDefault =
    DmaEngine<DEFAULT_CHANNEL_COUNT, DEFAULT_SINK_COUNT, DEFAULT_INSTRUCTION_COUNT>;

/// Engine with every table at its register-window maximum.
pub type DmaEngineLarge = DmaEngine<MAX_CHANNELS, MAX_SINKS, MAX_INSTRUCTIONS>;
