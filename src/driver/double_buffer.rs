//! Double-buffer composer
//!
//! Builds a four-instruction ping-pong out of bonds alone:
//!
//! ```text
//!   source_channel              mem_source channel
//!   start   : src -> buf0  ---egress--->  start+2 : buf0 -> sink
//!   start+1 : src -> buf1  ---egress--->  start+3 : buf1 -> sink
//! ```
//!
//! Each consumer half waits on the producer half that filled its buffer. The
//! reverse direction is not gated: a producer that runs a full round ahead of
//! a stalled consumer overwrites a buffer that is still being drained.

use super::bus::RegisterBus;
use super::config::InstructionConfig;
use super::controller::DmaController;
use super::error::{ConfigError, ConfigResult};

/// Instructions occupied by one double-buffer cycle
pub const DOUBLE_BUFFER_SLOTS: u32 = 4;

impl<B: RegisterBus> DmaController<B> {
    /// Wire `source_channel` and `mem_source` into a double-buffered stream
    /// from `source_addr` to `sink_addr`, `count` words per buffer.
    ///
    /// Uses instructions `start..start + 4`. The producer channel is routed
    /// into `mem_sink` and the consumer channel into `sink_channel`. Buffer
    /// addressing is set up here: `mem_sink` increments, the consumer channel
    /// increments its source, and every half restores its buffer address at
    /// the end of a pass. Stepping of `source_addr` and `sink_addr` is left to
    /// the caller.
    ///
    /// Nothing is enabled; enable both channels (and the engine) afterwards.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if a channel or sink index is invalid or the four
    /// instructions do not fit the table. Nothing is written in that case.
    pub fn setup_double_buffer(
        &mut self,
        start: u32,
        source_channel: u32,
        sink_channel: u32,
        mem_sink: u32,
        mem_source: u32,
        source_addr: u64,
        sink_addr: u64,
        buf0: u64,
        buf1: u64,
        count: u32,
    ) -> ConfigResult<()> {
        let last = start
            .checked_add(DOUBLE_BUFFER_SLOTS - 1)
            .ok_or(ConfigError::OutOfRange)?;
        if last >= self.instruction_count()
            || source_channel >= self.channel_count()
            || mem_source >= self.channel_count()
            || sink_channel >= self.sink_count()
            || mem_sink >= self.sink_count()
        {
            return Err(ConfigError::OutOfRange);
        }

        let fill0 = start;
        let fill1 = start + 1;
        let drain0 = start + 2;
        let drain1 = start + 3;

        let producer = |buf: u64, next: u32, consumer: u32| {
            InstructionConfig::new(source_addr, buf, count)
                .with_continue(true)
                .with_next(next)
                .with_egress(consumer)
                .with_dest_reset_on_cmd(true)
        };
        let consumer = |buf: u64, next: u32, producer: u32| {
            InstructionConfig::new(buf, sink_addr, count)
                .with_continue(true)
                .with_next(next)
                .with_ingress(producer)
                .with_src_reset_on_cmd(true)
        };

        self.set_instruction(fill0, &producer(buf0, fill1, drain0))?;
        self.set_instruction(fill1, &producer(buf1, fill0, drain1))?;
        self.set_instruction(drain0, &consumer(buf0, drain1, fill0))?;
        self.set_instruction(drain1, &consumer(buf1, drain0, fill1))?;

        self.set_channel_sink_addr(source_channel, mem_sink)?;
        self.set_channel_instruction_pointer(source_channel, fill0)?;
        self.enable_dest_address_increment(mem_sink, true)?;

        self.set_channel_sink_addr(mem_source, sink_channel)?;
        self.set_channel_instruction_pointer(mem_source, drain0)?;
        self.enable_source_address_decrement(mem_source, false)?;
        self.enable_source_address_increment(mem_source, true)?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "double buffer at {}: ch{} -> sink{} / ch{} -> sink{}",
            start,
            source_channel,
            mem_sink,
            mem_source,
            sink_channel
        );

        Ok(())
    }
}
