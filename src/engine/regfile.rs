//! Register window decode
//!
//! Maps word offsets onto the engine tables. Reads outside the implemented
//! tables return 0 and writes there are dropped, as on the hardware.

use super::DmaEngine;
use crate::driver::bus::RegisterBus;
use crate::internal::register::{
    BIT_CHANNEL_ENABLE, BIT_SINK_DEST_DATA_QUANTUM, BIT_SINK_STATUS_ERROR,
    BIT_SINK_STATUS_QUANTUM_PENDING, BIT_STATUS_ACTIVE_BOT, BIT_STATUS_ACTIVE_TOP,
    BIT_STATUS_BUSY, BIT_STATUS_CMD_FINISHED, BIT_STATUS_ERROR, CHANNEL_CONTROL_BASE,
    CHANNEL_COUNT, CHANNEL_STATUS_BASE, CONTROL, INST_BASE, INST_CNTRL, INST_COUNT,
    INST_DEST_ADDR_HIGH, INST_DEST_ADDR_LOW, INST_OFFSET, INST_SRC_ADDR_HIGH, INST_SRC_ADDR_LOW,
    MAX_SINKS, SINK_CONTROL_BASE, SINK_COUNT, SINK_STATUS_BASE, STATUS, bit_is_set, set_field, with_bit,
};

/// Decoded register offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reg {
    Control,
    Status,
    ChannelCount,
    SinkCount,
    ChannelControl(u32),
    ChannelStatus(u32),
    SinkControl(u32),
    SinkStatus(u32),
    Instruction(u32, u32),
    Unmapped,
}

impl Reg {
    const fn decode(addr: u32) -> Self {
        match addr {
            CONTROL => Reg::Control,
            STATUS => Reg::Status,
            CHANNEL_COUNT => Reg::ChannelCount,
            SINK_COUNT => Reg::SinkCount,
            a if a >= CHANNEL_CONTROL_BASE && a < CHANNEL_STATUS_BASE => {
                Reg::ChannelControl(a - CHANNEL_CONTROL_BASE)
            }
            a if a >= CHANNEL_STATUS_BASE && a < SINK_CONTROL_BASE => {
                Reg::ChannelStatus(a - CHANNEL_STATUS_BASE)
            }
            a if a >= SINK_CONTROL_BASE && a < SINK_STATUS_BASE => {
                Reg::SinkControl(a - SINK_CONTROL_BASE)
            }
            a if a >= SINK_STATUS_BASE && a < SINK_STATUS_BASE + MAX_SINKS as u32 => {
                Reg::SinkStatus(a - SINK_STATUS_BASE)
            }
            a if a >= INST_BASE => {
                let offset = a - INST_BASE;
                Reg::Instruction(offset / INST_OFFSET, offset % INST_OFFSET)
            }
            _ => Reg::Unmapped,
        }
    }
}

const fn low_word(value: u64) -> u32 {
    value as u32
}

const fn high_word(value: u64) -> u32 {
    (value >> 32) as u32
}

const fn with_low_word(value: u64, word: u32) -> u64 {
    (value & 0xFFFF_FFFF_0000_0000) | word as u64
}

const fn with_high_word(value: u64, word: u32) -> u64 {
    (value & 0x0000_0000_FFFF_FFFF) | ((word as u64) << 32)
}

impl<const C: usize, const S: usize, const I: usize> DmaEngine<C, S, I> {
    fn status_word(&mut self) -> u32 {
        let mut word = 0;
        word = with_bit(word, BIT_STATUS_BUSY, self.is_busy());
        word = with_bit(word, BIT_STATUS_ERROR, self.has_error());
        word = with_bit(word, BIT_STATUS_CMD_FINISHED, self.cmd_finished);
        self.cmd_finished = false;

        let mut active = 0;
        for (index, runner) in self.runners.iter().enumerate() {
            if runner.state.is_active() {
                active |= 1 << index;
            }
        }
        set_field(word, BIT_STATUS_ACTIVE_BOT, BIT_STATUS_ACTIVE_TOP, active)
    }

    fn write_channel_control(&mut self, index: u32, value: u32) {
        let Ok(channel) = self.channels.id(index) else {
            return;
        };
        let was_enabled = self.channels.get(channel).enabled();
        self.channels.get_mut(channel).set_control(value);
        let now_enabled = bit_is_set(value, BIT_CHANNEL_ENABLE);

        let runner = &mut self.runners[channel.index()];
        match (was_enabled, now_enabled) {
            (false, true) => {
                let config = *self.channels.get(channel);
                let sink = self.sinks.id(config.sink_raw());
                let entry = self.instructions.id(config.instruction_ptr_raw());
                match (sink, entry) {
                    (Ok(sink), Ok(entry)) => {
                        runner.start(sink, config.source_step(), entry);
                        #[cfg(feature = "log")]
                        {
                            log::debug!(
                                "channel {} enabled at instruction {} into sink {}",
                                index,
                                entry.raw(),
                                sink.raw()
                            );
                            if config.source_step() == super::AddressStep::Conflict {
                                log::warn!(
                                    "channel {index} has both source increment and decrement set; source address held"
                                );
                            }
                        }
                    }
                    _ => {
                        #[cfg(feature = "log")]
                        log::warn!(
                            "channel {} enabled with sink {} / instruction {} out of range",
                            index,
                            config.sink_raw(),
                            config.instruction_ptr_raw()
                        );
                        runner.fault();
                    }
                }
            }
            (true, false) => {
                self.cancel(channel);
                #[cfg(feature = "log")]
                log::debug!("channel {index} disabled");
            }
            _ => {}
        }
    }

    fn write_sink_control(&mut self, index: u32, value: u32) {
        let Ok(sink) = self.sinks.id(index) else {
            return;
        };
        let was_gated = self.sinks.get(sink).respects_quantum();
        self.sinks.get_mut(sink).set_control(value);
        if was_gated && !bit_is_set(value, BIT_SINK_DEST_DATA_QUANTUM) {
            // Quantum switched off: nothing may stay parked behind it.
            self.gates[sink.index()].reset_fill();
            self.release_gate(sink);
        }
    }

    fn read_instruction(&self, index: u32, word: u32) -> u32 {
        let Ok(id) = self.instructions.id(index) else {
            return 0;
        };
        let inst = self.instructions.get(id);
        match word {
            INST_SRC_ADDR_LOW => low_word(inst.source_address),
            INST_SRC_ADDR_HIGH => high_word(inst.source_address),
            INST_DEST_ADDR_LOW => low_word(inst.dest_address),
            INST_DEST_ADDR_HIGH => high_word(inst.dest_address),
            INST_COUNT => inst.count,
            INST_CNTRL => inst.control,
            _ => 0,
        }
    }

    fn write_instruction(&mut self, index: u32, word: u32, value: u32) {
        let Ok(id) = self.instructions.id(index) else {
            return;
        };
        let inst = self.instructions.get_mut(id);
        let cursor = &mut self.cursors[id.index()];
        match word {
            INST_SRC_ADDR_LOW => {
                inst.source_address = with_low_word(inst.source_address, value);
                cursor.src = inst.source_address;
            }
            INST_SRC_ADDR_HIGH => {
                inst.source_address = with_high_word(inst.source_address, value);
                cursor.src = inst.source_address;
            }
            INST_DEST_ADDR_LOW => {
                inst.dest_address = with_low_word(inst.dest_address, value);
                cursor.dest = inst.dest_address;
            }
            INST_DEST_ADDR_HIGH => {
                inst.dest_address = with_high_word(inst.dest_address, value);
                cursor.dest = inst.dest_address;
            }
            INST_COUNT => inst.count = value,
            INST_CNTRL => {
                inst.control = value;
                self.latches.clear(id);
            }
            _ => {}
        }
    }
}

impl<const C: usize, const S: usize, const I: usize> RegisterBus for DmaEngine<C, S, I> {
    fn read_register(&mut self, addr: u32) -> u32 {
        match Reg::decode(addr) {
            Reg::Control => self.control,
            Reg::Status => self.status_word(),
            Reg::ChannelCount => C as u32,
            Reg::SinkCount => S as u32,
            Reg::ChannelControl(i) => self
                .channels
                .id(i)
                .map_or(0, |ch| self.channels.get(ch).control()),
            Reg::ChannelStatus(i) => self
                .channels
                .id(i)
                .map_or(0, |ch| self.runners[ch.index()].status_word()),
            Reg::SinkControl(i) => self.sinks.id(i).map_or(0, |s| self.sinks.get(s).control()),
            Reg::SinkStatus(i) => self.sinks.id(i).map_or(0, |s| {
                let word = with_bit(0, BIT_SINK_STATUS_ERROR, self.sink_errors[s.index()].is_some());
                with_bit(
                    word,
                    BIT_SINK_STATUS_QUANTUM_PENDING,
                    self.gates[s.index()].is_pending(),
                )
            }),
            Reg::Instruction(index, word) => self.read_instruction(index, word),
            Reg::Unmapped => 0,
        }
    }

    fn write_register(&mut self, addr: u32, value: u32) {
        match Reg::decode(addr) {
            Reg::Control => self.control = value,
            Reg::ChannelControl(i) => self.write_channel_control(i, value),
            Reg::SinkControl(i) => self.write_sink_control(i, value),
            Reg::SinkStatus(i) => {
                if let Ok(sink) = self.sinks.id(i) {
                    if bit_is_set(value, BIT_SINK_STATUS_ERROR) {
                        self.sink_errors[sink.index()] = None;
                    }
                }
            }
            Reg::Instruction(index, word) => self.write_instruction(index, word, value),
            Reg::Status | Reg::ChannelCount | Reg::SinkCount | Reg::ChannelStatus(_) => {
                #[cfg(feature = "log")]
                log::warn!("write {value:#010x} to read-only register {addr:#04x} ignored");
            }
            Reg::Unmapped => {
                #[cfg(feature = "log")]
                log::warn!("write {value:#010x} to unmapped register {addr:#04x} ignored");
            }
        }
    }
}
