//! Host-side configuration interface
//!
//! [`DmaController`] validates every index against the table sizes before it
//! touches a register, so a rejected call never leaves a half-written
//! configuration behind. All mutation happens through read-modify-write
//! sequences on a [`RegisterBus`].

use embedded_hal::delay::DelayNs;

use super::bus::RegisterBus;
use super::config::{ControllerConfig, InstructionConfig};
use super::error::{ConfigError, ConfigResult, IoError, Result};
use super::status::{ChannelStatus, EngineStatus, SinkStatus};
use crate::internal::register::{
    BIT_CHANNEL_ENABLE, BIT_CHANNEL_SRC_ADDR_DEC, BIT_CHANNEL_SRC_ADDR_INC, BIT_CONTROL_ENABLE,
    BIT_CONTROL_INTERRUPT_CMD_FIN, BIT_INST_BOND_ADDR_IN_BOT, BIT_INST_BOND_ADDR_IN_TOP,
    BIT_INST_BOND_ADDR_OUT_BOT, BIT_INST_BOND_ADDR_OUT_TOP, BIT_INST_BOND_EGRESS,
    BIT_INST_BOND_INGRESS, BIT_INST_CONTINUE, BIT_INST_DEST_RST_ON_CMD, BIT_INST_NEXT_BOT,
    BIT_INST_NEXT_TOP, BIT_INST_PTR_BOT, BIT_INST_PTR_TOP, BIT_INST_SRC_RST_ON_CMD,
    BIT_SINK_ADDR_BOT, BIT_SINK_ADDR_TOP, BIT_SINK_DEST_ADDR_DEC, BIT_SINK_DEST_ADDR_INC,
    BIT_SINK_DEST_DATA_QUANTUM, BIT_SINK_STATUS_ERROR, CHANNEL_COUNT, CONTROL, INST_CNTRL,
    INST_COUNT, INST_DEST_ADDR_HIGH, INST_DEST_ADDR_LOW, INST_SRC_ADDR_HIGH, INST_SRC_ADDR_LOW,
    MAX_CHANNELS, MAX_SINKS, SINK_COUNT, STATUS, channel_control, channel_status, instruction,
    set_field, sink_control, sink_status, with_bit,
};

/// Which bond of an instruction a call refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bond {
    Ingress,
    Egress,
}

impl Bond {
    const fn bits(self) -> (u32, u32, u32) {
        match self {
            Bond::Ingress => (
                BIT_INST_BOND_INGRESS,
                BIT_INST_BOND_ADDR_IN_BOT,
                BIT_INST_BOND_ADDR_IN_TOP,
            ),
            Bond::Egress => (
                BIT_INST_BOND_EGRESS,
                BIT_INST_BOND_ADDR_OUT_BOT,
                BIT_INST_BOND_ADDR_OUT_TOP,
            ),
        }
    }
}

/// Host driver for the bonded DMA engine.
///
/// # Example
///
/// ```ignore
/// let mut dma = DmaController::new(bus);
/// dma.setup();
///
/// dma.set_channel_sink_addr(0, 0)?;
/// dma.enable_source_address_increment(0, true)?;
/// dma.enable_dest_address_increment(0, true)?;
/// dma.set_instruction(0, &InstructionConfig::new(0x0, 0x10, 0x200))?;
/// dma.set_channel_instruction_pointer(0, 0)?;
///
/// dma.enable_dma(true);
/// dma.enable_channel(0, true)?;
/// dma.wait_for_channel_halt(0, &mut delay, 10_000)?;
/// ```
pub struct DmaController<B: RegisterBus> {
    bus: B,
    config: ControllerConfig,
    channel_count: u32,
    sink_count: u32,
}

impl<B: RegisterBus> DmaController<B> {
    /// Attach to an engine with the default configuration, reading its
    /// channel and sink counts.
    pub fn new(bus: B) -> Self {
        Self::attach(bus, ControllerConfig::new())
    }

    /// Attach to an engine with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the instruction count does not fit the
    /// register layout or the poll interval is zero.
    pub fn with_config(bus: B, config: ControllerConfig) -> ConfigResult<Self> {
        if !config.is_valid() {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(Self::attach(bus, config))
    }

    fn attach(mut bus: B, config: ControllerConfig) -> Self {
        let channel_count = bus.read_register(CHANNEL_COUNT).min(MAX_CHANNELS as u32);
        let sink_count = bus.read_register(SINK_COUNT).min(MAX_SINKS as u32);
        Self {
            bus,
            config,
            channel_count,
            sink_count,
        }
    }

    /// Put the engine in a known state: globally disabled, every channel off.
    pub fn setup(&mut self) {
        self.enable_dma(false);
        for channel in 0..self.channel_count {
            self.bus
                .enable_register_bit(channel_control(channel), BIT_CHANNEL_ENABLE, false);
        }

        #[cfg(feature = "defmt")]
        defmt::info!(
            "DMA setup: {} channels, {} sinks, {} instructions",
            self.channel_count,
            self.sink_count,
            self.config.instruction_count
        );
    }

    /// Release the underlying register bus
    pub fn release(self) -> B {
        self.bus
    }

    /// Direct access to the register bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Active configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Channels implemented by the engine
    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    /// Sinks implemented by the engine
    pub fn sink_count(&self) -> u32 {
        self.sink_count
    }

    /// Instruction slots implemented by the engine
    pub fn instruction_count(&self) -> u32 {
        self.config.instruction_count
    }

    // =========================================================================
    // Index Validation
    // =========================================================================

    fn check_channel(&self, channel: u32) -> ConfigResult<()> {
        if channel < self.channel_count {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange)
        }
    }

    fn check_sink(&self, sink: u32) -> ConfigResult<()> {
        if sink < self.sink_count {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange)
        }
    }

    fn check_instruction(&self, inst: u32) -> ConfigResult<()> {
        if inst < self.config.instruction_count {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange)
        }
    }

    // =========================================================================
    // Global Control
    // =========================================================================

    /// Global master enable. Keep it off while bulk-configuring.
    pub fn enable_dma(&mut self, enable: bool) {
        self.bus
            .enable_register_bit(CONTROL, BIT_CONTROL_ENABLE, enable);
    }

    /// Check the global master enable
    pub fn is_dma_enabled(&mut self) -> bool {
        self.bus.is_register_bit_set(CONTROL, BIT_CONTROL_ENABLE)
    }

    /// Latch STATUS command-finished whenever a channel halts
    pub fn enable_interrupt_on_command_finish(&mut self, enable: bool) {
        self.bus
            .enable_register_bit(CONTROL, BIT_CONTROL_INTERRUPT_CMD_FIN, enable);
    }

    /// Check whether command-finish reporting is enabled
    pub fn is_interrupt_on_command_finish_enabled(&mut self) -> bool {
        self.bus
            .is_register_bit_set(CONTROL, BIT_CONTROL_INTERRUPT_CMD_FIN)
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Route a channel into a sink.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if either index is invalid.
    pub fn set_channel_sink_addr(&mut self, channel: u32, sink: u32) -> ConfigResult<()> {
        self.check_channel(channel)?;
        self.check_sink(sink)?;
        self.bus.write_register_field(
            channel_control(channel),
            BIT_SINK_ADDR_BOT,
            BIT_SINK_ADDR_TOP,
            sink,
        );
        Ok(())
    }

    /// Sink a channel feeds
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn get_channel_sink_addr(&mut self, channel: u32) -> ConfigResult<u32> {
        self.check_channel(channel)?;
        Ok(self.bus.read_register_field(
            channel_control(channel),
            BIT_SINK_ADDR_BOT,
            BIT_SINK_ADDR_TOP,
        ))
    }

    /// Point a channel at the first instruction of its chain.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if either index is invalid.
    pub fn set_channel_instruction_pointer(&mut self, channel: u32, inst: u32) -> ConfigResult<()> {
        self.check_channel(channel)?;
        self.check_instruction(inst)?;
        self.bus.write_register_field(
            channel_control(channel),
            BIT_INST_PTR_BOT,
            BIT_INST_PTR_TOP,
            inst,
        );
        Ok(())
    }

    /// Entry instruction of a channel
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn get_channel_instruction_pointer(&mut self, channel: u32) -> ConfigResult<u32> {
        self.check_channel(channel)?;
        Ok(self.bus.read_register_field(
            channel_control(channel),
            BIT_INST_PTR_BOT,
            BIT_INST_PTR_TOP,
        ))
    }

    /// Step the source address up after each word.
    ///
    /// Does not clear the decrement flag. With both set the engine holds the
    /// source address and reports a step conflict in CHANNEL_STATUS.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn enable_source_address_increment(&mut self, channel: u32, enable: bool) -> ConfigResult<()> {
        self.check_channel(channel)?;
        self.bus
            .enable_register_bit(channel_control(channel), BIT_CHANNEL_SRC_ADDR_INC, enable);
        Ok(())
    }

    /// Check the source increment flag
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn is_source_address_increment(&mut self, channel: u32) -> ConfigResult<bool> {
        self.check_channel(channel)?;
        Ok(self
            .bus
            .is_register_bit_set(channel_control(channel), BIT_CHANNEL_SRC_ADDR_INC))
    }

    /// Step the source address down after each word. Does not clear increment.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn enable_source_address_decrement(&mut self, channel: u32, enable: bool) -> ConfigResult<()> {
        self.check_channel(channel)?;
        self.bus
            .enable_register_bit(channel_control(channel), BIT_CHANNEL_SRC_ADDR_DEC, enable);
        Ok(())
    }

    /// Check the source decrement flag
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn is_source_address_decrement(&mut self, channel: u32) -> ConfigResult<bool> {
        self.check_channel(channel)?;
        Ok(self
            .bus
            .is_register_bit_set(channel_control(channel), BIT_CHANNEL_SRC_ADDR_DEC))
    }

    /// Start or stop a channel.
    ///
    /// Enabling publishes the channel's current configuration to the engine
    /// in one register write. Disabling returns it to idle after the word in
    /// flight and clears its transfer error.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn enable_channel(&mut self, channel: u32, enable: bool) -> ConfigResult<()> {
        self.check_channel(channel)?;
        self.bus
            .enable_register_bit(channel_control(channel), BIT_CHANNEL_ENABLE, enable);
        Ok(())
    }

    /// Check a channel's enable bit
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn is_channel_enable(&mut self, channel: u32) -> ConfigResult<bool> {
        self.check_channel(channel)?;
        Ok(self
            .bus
            .is_register_bit_set(channel_control(channel), BIT_CHANNEL_ENABLE))
    }

    // =========================================================================
    // Sinks
    // =========================================================================

    /// Step the destination address up after each word (clears decrement).
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is invalid.
    pub fn enable_dest_address_increment(&mut self, sink: u32, enable: bool) -> ConfigResult<()> {
        self.check_sink(sink)?;
        self.set_dest_step(sink, BIT_SINK_DEST_ADDR_INC, BIT_SINK_DEST_ADDR_DEC, enable);
        Ok(())
    }

    /// Check the destination increment flag
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is invalid.
    pub fn is_dest_address_increment(&mut self, sink: u32) -> ConfigResult<bool> {
        self.check_sink(sink)?;
        Ok(self
            .bus
            .is_register_bit_set(sink_control(sink), BIT_SINK_DEST_ADDR_INC))
    }

    /// Step the destination address down after each word (clears increment).
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is invalid.
    pub fn enable_dest_address_decrement(&mut self, sink: u32, enable: bool) -> ConfigResult<()> {
        self.check_sink(sink)?;
        self.set_dest_step(sink, BIT_SINK_DEST_ADDR_DEC, BIT_SINK_DEST_ADDR_INC, enable);
        Ok(())
    }

    /// Check the destination decrement flag
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is invalid.
    pub fn is_dest_address_decrement(&mut self, sink: u32) -> ConfigResult<bool> {
        self.check_sink(sink)?;
        Ok(self
            .bus
            .is_register_bit_set(sink_control(sink), BIT_SINK_DEST_ADDR_DEC))
    }

    /// Single write so the sink never holds both directions at once
    fn set_dest_step(&mut self, sink: u32, bit: u32, opposite: u32, enable: bool) {
        let addr = sink_control(sink);
        let mut value = self.bus.read_register(addr);
        value = with_bit(value, bit, enable);
        if enable {
            value = with_bit(value, opposite, false);
        }
        self.bus.write_register(addr, value);
    }

    /// Hold bond completion until a full quantum has reached the sink.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is invalid.
    pub fn enable_dest_respect_quantum(&mut self, sink: u32, enable: bool) -> ConfigResult<()> {
        self.check_sink(sink)?;
        self.bus
            .enable_register_bit(sink_control(sink), BIT_SINK_DEST_DATA_QUANTUM, enable);
        Ok(())
    }

    /// Check the respect-quantum flag
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is invalid.
    pub fn is_dest_respect_quantum(&mut self, sink: u32) -> ConfigResult<bool> {
        self.check_sink(sink)?;
        Ok(self
            .bus
            .is_register_bit_set(sink_control(sink), BIT_SINK_DEST_DATA_QUANTUM))
    }

    // =========================================================================
    // Instructions
    // =========================================================================

    fn write_address(&mut self, inst: u32, low: u32, high: u32, addr: u64) {
        self.bus.write_register(instruction(inst, low), addr as u32);
        self.bus
            .write_register(instruction(inst, high), (addr >> 32) as u32);
    }

    fn read_address(&mut self, inst: u32, low: u32, high: u32) -> u64 {
        let low = self.bus.read_register(instruction(inst, low)) as u64;
        let high = self.bus.read_register(instruction(inst, high)) as u64;
        (high << 32) | low
    }

    /// Set the source base address of an instruction.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn set_instruction_source_address(&mut self, inst: u32, addr: u64) -> ConfigResult<()> {
        self.check_instruction(inst)?;
        self.write_address(inst, INST_SRC_ADDR_LOW, INST_SRC_ADDR_HIGH, addr);
        Ok(())
    }

    /// Source base address of an instruction
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn get_instruction_source_address(&mut self, inst: u32) -> ConfigResult<u64> {
        self.check_instruction(inst)?;
        Ok(self.read_address(inst, INST_SRC_ADDR_LOW, INST_SRC_ADDR_HIGH))
    }

    /// Set the destination base address of an instruction.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn set_instruction_dest_address(&mut self, inst: u32, addr: u64) -> ConfigResult<()> {
        self.check_instruction(inst)?;
        self.write_address(inst, INST_DEST_ADDR_LOW, INST_DEST_ADDR_HIGH, addr);
        Ok(())
    }

    /// Destination base address of an instruction
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn get_instruction_dest_address(&mut self, inst: u32) -> ConfigResult<u64> {
        self.check_instruction(inst)?;
        Ok(self.read_address(inst, INST_DEST_ADDR_LOW, INST_DEST_ADDR_HIGH))
    }

    /// Set the number of words an instruction moves.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn set_instruction_count(&mut self, inst: u32, count: u32) -> ConfigResult<()> {
        self.check_instruction(inst)?;
        self.bus.write_register(instruction(inst, INST_COUNT), count);
        Ok(())
    }

    /// Word count of an instruction
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn get_instruction_count(&mut self, inst: u32) -> ConfigResult<u32> {
        self.check_instruction(inst)?;
        Ok(self.bus.read_register(instruction(inst, INST_COUNT)))
    }

    fn set_bond(&mut self, inst: u32, bond: Bond, enable: bool, target: Option<u32>) -> ConfigResult<()> {
        self.check_instruction(inst)?;
        let (enable_bit, bot, top) = bond.bits();
        let addr = instruction(inst, INST_CNTRL);

        if !enable {
            let value = self.bus.read_register(addr);
            let value = with_bit(set_field(value, bot, top, 0), enable_bit, false);
            self.bus.write_register(addr, value);
            return Ok(());
        }

        let target = target.ok_or(ConfigError::MissingBondAddress)?;
        self.check_instruction(target)?;
        let value = self.bus.read_register(addr);
        let value = with_bit(set_field(value, bot, top, target), enable_bit, true);
        self.bus.write_register(addr, value);
        Ok(())
    }

    fn get_bond(&mut self, inst: u32, bond: Bond) -> ConfigResult<Option<u32>> {
        self.check_instruction(inst)?;
        let (enable_bit, bot, top) = bond.bits();
        let addr = instruction(inst, INST_CNTRL);
        if self.bus.is_register_bit_set(addr, enable_bit) {
            Ok(Some(self.bus.read_register_field(addr, bot, top)))
        } else {
            Ok(None)
        }
    }

    /// Gate an instruction on the completion of `bond_inst`. Disabling also
    /// zeroes the stored target.
    ///
    /// # Errors
    ///
    /// Returns `MissingBondAddress` when enabling without `bond_inst`, and
    /// `OutOfRange` if either index is invalid.
    pub fn set_instruction_ingress(
        &mut self,
        inst: u32,
        enable: bool,
        bond_inst: Option<u32>,
    ) -> ConfigResult<()> {
        self.set_bond(inst, Bond::Ingress, enable, bond_inst)
    }

    /// Ingress bond target, if the ingress bond is enabled
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn get_instruction_ingress(&mut self, inst: u32) -> ConfigResult<Option<u32>> {
        self.get_bond(inst, Bond::Ingress)
    }

    /// Signal `bond_inst` whenever an instruction completes.
    ///
    /// # Errors
    ///
    /// Returns `MissingBondAddress` when enabling without `bond_inst`, and
    /// `OutOfRange` if either index is invalid.
    pub fn set_instruction_egress(
        &mut self,
        inst: u32,
        enable: bool,
        bond_inst: Option<u32>,
    ) -> ConfigResult<()> {
        self.set_bond(inst, Bond::Egress, enable, bond_inst)
    }

    /// Egress bond target, if the egress bond is enabled
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn get_instruction_egress(&mut self, inst: u32) -> ConfigResult<Option<u32>> {
        self.get_bond(inst, Bond::Egress)
    }

    /// Set the instruction loaded after `inst` when it continues.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if either index is invalid.
    pub fn set_instruction_next_instruction(&mut self, inst: u32, next: u32) -> ConfigResult<()> {
        self.check_instruction(inst)?;
        self.check_instruction(next)?;
        self.bus.write_register_field(
            instruction(inst, INST_CNTRL),
            BIT_INST_NEXT_BOT,
            BIT_INST_NEXT_TOP,
            next,
        );
        Ok(())
    }

    /// Next instruction of `inst`
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn get_instruction_next_instruction(&mut self, inst: u32) -> ConfigResult<u32> {
        self.check_instruction(inst)?;
        Ok(self.bus.read_register_field(
            instruction(inst, INST_CNTRL),
            BIT_INST_NEXT_BOT,
            BIT_INST_NEXT_TOP,
        ))
    }

    fn set_control_bit(&mut self, inst: u32, bit: u32, enable: bool) -> ConfigResult<()> {
        self.check_instruction(inst)?;
        self.bus
            .enable_register_bit(instruction(inst, INST_CNTRL), bit, enable);
        Ok(())
    }

    fn control_bit(&mut self, inst: u32, bit: u32) -> ConfigResult<bool> {
        self.check_instruction(inst)?;
        Ok(self.bus.is_register_bit_set(instruction(inst, INST_CNTRL), bit))
    }

    /// Follow `next_instruction` after completion instead of halting.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn enable_instruction_continue(&mut self, inst: u32, enable: bool) -> ConfigResult<()> {
        self.set_control_bit(inst, BIT_INST_CONTINUE, enable)
    }

    /// Check the continue flag
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn is_instruction_continue(&mut self, inst: u32) -> ConfigResult<bool> {
        self.control_bit(inst, BIT_INST_CONTINUE)
    }

    /// Restore the source address to its base after each pass.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn enable_instruction_src_addr_reset_on_cmd(&mut self, inst: u32, enable: bool) -> ConfigResult<()> {
        self.set_control_bit(inst, BIT_INST_SRC_RST_ON_CMD, enable)
    }

    /// Check the source reset-on-command flag
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn is_instruction_src_addr_reset_on_cmd(&mut self, inst: u32) -> ConfigResult<bool> {
        self.control_bit(inst, BIT_INST_SRC_RST_ON_CMD)
    }

    /// Restore the destination address to its base after each pass.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn enable_instruction_dest_addr_reset_on_cmd(&mut self, inst: u32, enable: bool) -> ConfigResult<()> {
        self.set_control_bit(inst, BIT_INST_DEST_RST_ON_CMD, enable)
    }

    /// Check the destination reset-on-command flag
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` is invalid.
    pub fn is_instruction_dest_addr_reset_on_cmd(&mut self, inst: u32) -> ConfigResult<bool> {
        self.control_bit(inst, BIT_INST_DEST_RST_ON_CMD)
    }

    /// Write every field of an instruction.
    ///
    /// All indices are checked first; on error nothing is written. The control
    /// word is written last and in one piece, which also drops any completion
    /// tokens still pending for the slot.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `inst` or any index in `config` is invalid.
    pub fn set_instruction(&mut self, inst: u32, config: &InstructionConfig) -> ConfigResult<()> {
        self.check_instruction(inst)?;
        self.check_instruction(config.next_instruction)?;
        if let Some(target) = config.ingress_bond {
            self.check_instruction(target)?;
        }
        if let Some(target) = config.egress_bond {
            self.check_instruction(target)?;
        }

        let mut control = 0;
        control = with_bit(control, BIT_INST_CONTINUE, config.continue_flag);
        control = with_bit(control, BIT_INST_SRC_RST_ON_CMD, config.src_reset_on_cmd);
        control = with_bit(control, BIT_INST_DEST_RST_ON_CMD, config.dest_reset_on_cmd);
        control = set_field(control, BIT_INST_NEXT_BOT, BIT_INST_NEXT_TOP, config.next_instruction);
        if let Some(target) = config.ingress_bond {
            control = with_bit(control, BIT_INST_BOND_INGRESS, true);
            control = set_field(control, BIT_INST_BOND_ADDR_IN_BOT, BIT_INST_BOND_ADDR_IN_TOP, target);
        }
        if let Some(target) = config.egress_bond {
            control = with_bit(control, BIT_INST_BOND_EGRESS, true);
            control = set_field(control, BIT_INST_BOND_ADDR_OUT_BOT, BIT_INST_BOND_ADDR_OUT_TOP, target);
        }

        self.write_address(inst, INST_SRC_ADDR_LOW, INST_SRC_ADDR_HIGH, config.source_address);
        self.write_address(inst, INST_DEST_ADDR_LOW, INST_DEST_ADDR_HIGH, config.dest_address);
        self.bus.write_register(instruction(inst, INST_COUNT), config.count);
        self.bus.write_register(instruction(inst, INST_CNTRL), control);
        Ok(())
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Read global status (clears the command-finished latch)
    pub fn engine_status(&mut self) -> EngineStatus {
        EngineStatus::from_raw(self.bus.read_register(STATUS))
    }

    /// Read a channel's execution status.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is invalid.
    pub fn channel_status(&mut self, channel: u32) -> ConfigResult<ChannelStatus> {
        self.check_channel(channel)?;
        Ok(ChannelStatus::from_raw(
            self.bus.read_register(channel_status(channel)),
        ))
    }

    /// Read a sink's status.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is invalid.
    pub fn sink_status(&mut self, sink: u32) -> ConfigResult<SinkStatus> {
        self.check_sink(sink)?;
        Ok(SinkStatus::from_raw(self.bus.read_register(sink_status(sink))))
    }

    /// Acknowledge a sink's transfer error.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `sink` is invalid.
    pub fn clear_sink_error(&mut self, sink: u32) -> ConfigResult<()> {
        self.check_sink(sink)?;
        self.bus
            .write_register(sink_status(sink), 1 << BIT_SINK_STATUS_ERROR);
        Ok(())
    }

    /// Poll until a channel halts.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if `channel` is invalid
    /// - `IoError::InvalidState` if the channel is stalled on a transfer
    ///   error, or is neither enabled nor halted
    /// - `IoError::Timeout` if it is still running after `timeout_us`
    pub fn wait_for_channel_halt<D: DelayNs>(
        &mut self,
        channel: u32,
        mut delay: D,
        timeout_us: u32,
    ) -> Result<ChannelStatus> {
        let interval = self.config.poll_interval_us.max(1);
        let max_iterations = timeout_us / interval;
        for _ in 0..=max_iterations {
            let status = self.channel_status(channel)?;
            if status.halted {
                return Ok(status);
            }
            if status.error || (!status.active && !self.is_channel_enable(channel)?) {
                return Err(IoError::InvalidState.into());
            }
            delay.delay_us(interval);
        }

        Err(IoError::Timeout.into())
    }

    /// [`wait_for_channel_halt`](Self::wait_for_channel_halt) with the
    /// configured default timeout.
    ///
    /// # Errors
    ///
    /// See [`wait_for_channel_halt`](Self::wait_for_channel_halt).
    pub fn wait_for_halt<D: DelayNs>(&mut self, channel: u32, delay: D) -> Result<ChannelStatus> {
        let timeout_us = self.config.halt_timeout_us;
        self.wait_for_channel_halt(channel, delay, timeout_us)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
