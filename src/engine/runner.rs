//! Per-channel execution state machine
//!
//! Every enabled channel walks its instruction chain one tick at a time:
//!
//! ```text
//! IDLE -> CONTINUE -> RUNNING -> CONTINUE -> ... -> HALTED
//!                 \-> WAITING_ON_BOND -> RUNNING
//! ```
//!
//! `CONTINUE` means "load the instruction at the pending pointer on the next
//! tick". A channel that raised a transfer error keeps its state but stops
//! ticking until the host disables it.

use super::DmaEngine;
use super::port::{DataBus, PortError};
use super::table::{AddressStep, ChannelId, Instruction, InstructionId, SinkId};
use crate::driver::error::TransferError;
use crate::internal::constants::WORD_BYTES;
use crate::internal::register::{
    BIT_CHANNEL_STATUS_ACTIVE, BIT_CHANNEL_STATUS_ERROR, BIT_CHANNEL_STATUS_HALTED,
    BIT_CHANNEL_STATUS_INST_BOT, BIT_CHANNEL_STATUS_INST_TOP, BIT_CHANNEL_STATUS_STEP_CONFLICT,
    BIT_CHANNEL_STATUS_WAITING, BIT_CONTROL_INTERRUPT_CMD_FIN, bit_is_set, set_field, with_bit,
};

// =============================================================================
// Channel State
// =============================================================================

/// Execution state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// Disabled, or never started
    #[default]
    Idle,
    /// Moving words for the loaded instruction
    Running,
    /// Blocked until the ingress-bonded instruction signals completion
    WaitingOnBond,
    /// Instruction finished; the next one loads on the following tick
    Continue,
    /// Reached the end of a chain without `continue`
    Halted,
}

impl ChannelState {
    /// Running, waiting or about to load an instruction
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            ChannelState::Running | ChannelState::WaitingOnBond | ChannelState::Continue
        )
    }
}

/// Instruction in flight on a channel
#[derive(Debug, Clone, Copy)]
pub(crate) struct Job {
    id: InstructionId,
    inst: Instruction,
    remaining: u32,
    /// Word already read but not yet accepted by the sink
    held: Option<u32>,
}

/// Runtime state of one channel, published from its control word on enable.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ChannelRunner {
    pub state: ChannelState,
    sink: Option<SinkId>,
    step: AddressStep,
    pending: Option<InstructionId>,
    job: Option<Job>,
    current: Option<InstructionId>,
    pub error: Option<TransferError>,
    step_conflict: bool,
}

impl ChannelRunner {
    pub const fn new() -> Self {
        Self {
            state: ChannelState::Idle,
            sink: None,
            step: AddressStep::Hold,
            pending: None,
            job: None,
            current: None,
            error: None,
            step_conflict: false,
        }
    }

    /// Publish a channel configuration and arm the first load.
    pub fn start(&mut self, sink: SinkId, step: AddressStep, entry: InstructionId) {
        *self = Self {
            state: ChannelState::Continue,
            sink: Some(sink),
            step,
            pending: Some(entry),
            step_conflict: step == AddressStep::Conflict,
            ..Self::new()
        };
    }

    /// Return to idle, dropping any word that was read but not delivered.
    pub fn stop(&mut self) {
        let current = self.current;
        *self = Self::new();
        self.current = current;
    }

    /// A channel whose start-up configuration was unusable
    pub fn fault(&mut self) {
        *self = Self::new();
        self.state = ChannelState::Halted;
    }

    /// Encode as a `CHANNEL_STATUS` word
    pub fn status_word(&self) -> u32 {
        let mut word = 0;
        word = with_bit(word, BIT_CHANNEL_STATUS_ACTIVE, self.state.is_active());
        word = with_bit(
            word,
            BIT_CHANNEL_STATUS_WAITING,
            self.state == ChannelState::WaitingOnBond,
        );
        word = with_bit(word, BIT_CHANNEL_STATUS_HALTED, self.state == ChannelState::Halted);
        word = with_bit(word, BIT_CHANNEL_STATUS_ERROR, self.error.is_some());
        word = with_bit(word, BIT_CHANNEL_STATUS_STEP_CONFLICT, self.step_conflict);
        if let Some(current) = self.current {
            word = set_field(
                word,
                BIT_CHANNEL_STATUS_INST_BOT,
                BIT_CHANNEL_STATUS_INST_TOP,
                current.raw(),
            );
        }
        word
    }
}

// =============================================================================
// Stepping
// =============================================================================

impl<const C: usize, const S: usize, const I: usize> DmaEngine<C, S, I> {
    /// Advance one channel by a single tick.
    pub(super) fn tick<B: DataBus + ?Sized>(&mut self, channel: ChannelId, bus: &mut B) {
        let mut runner = self.runners[channel.index()];
        if runner.error.is_none() {
            self.step(channel, &mut runner, bus);
        }
        self.runners[channel.index()] = runner;
    }

    fn step<B: DataBus + ?Sized>(
        &mut self,
        channel: ChannelId,
        runner: &mut ChannelRunner,
        bus: &mut B,
    ) {
        match runner.state {
            ChannelState::Idle | ChannelState::Halted => {}
            ChannelState::Continue => {
                if let Some(id) = runner.pending.take() {
                    self.load(channel, runner, id);
                }
            }
            ChannelState::WaitingOnBond => {
                if let Some(job) = runner.job {
                    if self.latches.take(job.id) {
                        #[cfg(feature = "log")]
                        log::debug!("channel {} released by bond on {}", channel.raw(), job.id.raw());
                        runner.state = ChannelState::Running;
                    }
                }
            }
            ChannelState::Running => self.transfer_word(channel, runner, bus),
        }
    }

    /// Copy an instruction out of the table and decide whether it may start.
    fn load(&mut self, channel: ChannelId, runner: &mut ChannelRunner, id: InstructionId) {
        let inst = *self.instructions.get(id);
        runner.current = Some(id);
        runner.job = Some(Job {
            id,
            inst,
            remaining: inst.count,
            held: None,
        });

        let gated = match inst.ingress_raw() {
            Some(_) => !self.latches.take(id),
            None => false,
        };
        runner.state = if gated {
            ChannelState::WaitingOnBond
        } else {
            ChannelState::Running
        };

        #[cfg(feature = "log")]
        log::debug!(
            "channel {} loaded instruction {} ({} words{})",
            channel.raw(),
            id.raw(),
            inst.count,
            if gated { ", waiting on bond" } else { "" }
        );
        #[cfg(not(feature = "log"))]
        let _ = channel;
    }

    /// Move at most one word, then finish the instruction if it is done.
    fn transfer_word<B: DataBus + ?Sized>(
        &mut self,
        channel: ChannelId,
        runner: &mut ChannelRunner,
        bus: &mut B,
    ) {
        let (Some(mut job), Some(sink)) = (runner.job, runner.sink) else {
            runner.state = ChannelState::Halted;
            return;
        };

        if job.remaining > 0 {
            let cursor = self.cursors[job.id.index()];

            let word = match job.held {
                Some(word) => word,
                None => match bus.read_word(channel, cursor.src) {
                    Ok(word) => word,
                    Err(PortError::Busy) => return,
                    Err(PortError::OutOfRange) => {
                        self.raise(runner, None, TransferError::SourceOutOfRange, cursor.src);
                        return;
                    }
                },
            };

            match bus.write_word(sink, cursor.dest, word) {
                Ok(()) => {}
                Err(PortError::Busy) => {
                    job.held = Some(word);
                    runner.job = Some(job);
                    return;
                }
                Err(PortError::OutOfRange) => {
                    job.held = Some(word);
                    runner.job = Some(job);
                    self.raise(runner, Some(sink), TransferError::SinkOutOfRange, cursor.dest);
                    return;
                }
            }

            let dest_step = self.sinks.get(sink).dest_step();
            let cursor = &mut self.cursors[job.id.index()];
            cursor.src = runner.step.apply(cursor.src, WORD_BYTES);
            cursor.dest = dest_step.apply(cursor.dest, WORD_BYTES);

            job.held = None;
            job.remaining -= 1;

            if self.sinks.get(sink).respects_quantum()
                && self.gates[sink.index()].record_word(self.config.quantum_words)
            {
                self.release_gate(sink);
            }
        }

        runner.job = Some(job);
        if job.remaining == 0 {
            self.complete(channel, runner, sink, job);
        }
    }

    /// Stop a channel between ticks.
    ///
    /// A pass cut short still honors its reset-on-cmd bits, so the next
    /// invocation of the instruction starts from its configured base.
    pub(super) fn cancel(&mut self, channel: ChannelId) {
        if let Some(job) = self.runners[channel.index()].job {
            self.reset_cursor(&job);
        }
        self.runners[channel.index()].stop();
    }

    fn reset_cursor(&mut self, job: &Job) {
        let cursor = &mut self.cursors[job.id.index()];
        if job.inst.src_reset_on_cmd() {
            cursor.src = job.inst.source_address;
        }
        if job.inst.dest_reset_on_cmd() {
            cursor.dest = job.inst.dest_address;
        }
    }

    /// Finish a pass: reset cursors, signal bonds, follow the chain.
    fn complete(&mut self, channel: ChannelId, runner: &mut ChannelRunner, sink: SinkId, job: Job) {
        self.reset_cursor(&job);

        let gate = &mut self.gates[sink.index()];
        if self.sinks.get(sink).respects_quantum() && !gate.at_boundary() {
            gate.defer(job.id);
        } else {
            self.signal_completion(job.id, 1);
        }

        runner.job = None;
        if job.inst.continues() {
            match self.instructions.id(job.inst.next_raw()) {
                Ok(next) => {
                    runner.pending = Some(next);
                    runner.state = ChannelState::Continue;
                }
                Err(_) => {
                    #[cfg(feature = "log")]
                    log::warn!(
                        "channel {} next instruction {} out of range, halting",
                        channel.raw(),
                        job.inst.next_raw()
                    );
                    self.halt(channel, runner);
                }
            }
        } else {
            self.halt(channel, runner);
        }
    }

    fn halt(&mut self, channel: ChannelId, runner: &mut ChannelRunner) {
        runner.state = ChannelState::Halted;
        if bit_is_set(self.control, BIT_CONTROL_INTERRUPT_CMD_FIN) {
            self.cmd_finished = true;
        }

        #[cfg(feature = "log")]
        log::debug!("channel {} halted", channel.raw());
        #[cfg(not(feature = "log"))]
        let _ = channel;
    }

    fn raise(
        &mut self,
        runner: &mut ChannelRunner,
        sink: Option<SinkId>,
        error: TransferError,
        addr: u64,
    ) {
        runner.error = Some(error);
        if let Some(sink) = sink {
            self.sink_errors[sink.index()] = Some(error);
        }

        #[cfg(feature = "log")]
        log::warn!("transfer error at {addr:#x}: {error}");
        #[cfg(not(feature = "log"))]
        let _ = addr;
    }

    /// Post `count` tokens from `source` to every instruction bonded to it.
    ///
    /// A target named by `source`'s egress bond and naming `source` in its own
    /// ingress bond receives the tokens once.
    pub(super) fn signal_completion(&mut self, source: InstructionId, count: u32) {
        let egress = self.instructions.get(source).egress_raw();
        for (target, inst) in self.instructions.iter() {
            let named_by_source = egress == Some(target.raw());
            let names_source = inst.ingress_raw() == Some(source.raw());
            if named_by_source || names_source {
                for _ in 0..count {
                    self.latches.post(target);
                }
            }
        }
    }

    /// Release every completion parked behind a sink's quantum.
    pub(super) fn release_gate(&mut self, sink: SinkId) {
        let mut parked = [0u32; I];
        self.gates[sink.index()].drain(|inst, n| parked[inst.index()] = n);
        for (index, &count) in parked.iter().enumerate() {
            if count != 0 {
                if let Ok(source) = self.instructions.id(index as u32) {
                    self.signal_completion(source, count);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::table::TableIndex;

    #[test]
    fn active_states() {
        assert!(!ChannelState::Idle.is_active());
        assert!(ChannelState::Running.is_active());
        assert!(ChannelState::WaitingOnBond.is_active());
        assert!(ChannelState::Continue.is_active());
        assert!(!ChannelState::Halted.is_active());
    }

    #[test]
    fn start_flags_step_conflict() {
        let mut runner = ChannelRunner::new();
        runner.start(
            SinkId::from_checked(0),
            AddressStep::Conflict,
            InstructionId::from_checked(3),
        );
        assert_eq!(runner.state, ChannelState::Continue);
        assert!(bit_is_set(runner.status_word(), BIT_CHANNEL_STATUS_STEP_CONFLICT));
        assert!(bit_is_set(runner.status_word(), BIT_CHANNEL_STATUS_ACTIVE));
    }

    #[test]
    fn stop_keeps_last_instruction_and_clears_error() {
        let mut runner = ChannelRunner::new();
        runner.current = Some(InstructionId::from_checked(5));
        runner.error = Some(TransferError::SinkOutOfRange);
        runner.state = ChannelState::Running;

        runner.stop();
        assert_eq!(runner.state, ChannelState::Idle);
        assert!(runner.error.is_none());
        assert_eq!(
            crate::internal::register::get_field(
                runner.status_word(),
                BIT_CHANNEL_STATUS_INST_BOT,
                BIT_CHANNEL_STATUS_INST_TOP
            ),
            5
        );
    }

    #[test]
    fn fault_halts_without_error() {
        let mut runner = ChannelRunner::new();
        runner.fault();
        let word = runner.status_word();
        assert!(bit_is_set(word, BIT_CHANNEL_STATUS_HALTED));
        assert!(!bit_is_set(word, BIT_CHANNEL_STATUS_ERROR));
        assert!(!bit_is_set(word, BIT_CHANNEL_STATUS_ACTIVE));
    }
}
