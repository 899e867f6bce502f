//! One OS thread per channel, coordinated only through bonds.
#![cfg(feature = "critical-section")]

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use bonded_dma::{
    ChannelId, ChannelState, DataBus, DmaController, InstructionConfig, PortError, PortResult,
    SharedDmaEngine, SinkId,
};

const WORD: u64 = 4;

/// Memories shared by every worker thread, with a routing table for the
/// channel and sink ports.
struct Fabric {
    memories: Mutex<Vec<Vec<u32>>>,
    channels: Vec<usize>,
    sinks: Vec<usize>,
}

impl Fabric {
    fn new(memories: Vec<Vec<u32>>, channels: Vec<usize>, sinks: Vec<usize>) -> Self {
        Self {
            memories: Mutex::new(memories),
            channels,
            sinks,
        }
    }

    fn snapshot(&self, index: usize) -> Vec<u32> {
        self.memories.lock().unwrap()[index].clone()
    }
}

impl DataBus for &Fabric {
    fn read_word(&mut self, channel: ChannelId, addr: u64) -> PortResult<u32> {
        let memory = *self.channels.get(channel.index()).ok_or(PortError::OutOfRange)?;
        let memories = self.memories.lock().unwrap();
        memories[memory]
            .get((addr / WORD) as usize)
            .copied()
            .ok_or(PortError::OutOfRange)
    }

    fn write_word(&mut self, sink: SinkId, addr: u64, word: u32) -> PortResult<()> {
        let memory = *self.sinks.get(sink.index()).ok_or(PortError::OutOfRange)?;
        let mut memories = self.memories.lock().unwrap();
        let slot = memories[memory]
            .get_mut((addr / WORD) as usize)
            .ok_or(PortError::OutOfRange)?;
        *slot = word;
        Ok(())
    }
}

/// Poll `channel` until it stops being active or the deadline passes.
fn run_channel(engine: &SharedDmaEngine<2, 2, 8>, fabric: &Fabric, channel: u32) -> ChannelState {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut bus = fabric;
    loop {
        engine.poll_channel(channel, &mut bus).unwrap();
        let state = engine.with(|e| e.channel_state(channel)).unwrap();
        if !state.is_active() || Instant::now() > deadline {
            return state;
        }
        thread::yield_now();
    }
}

#[test]
fn bonded_handoff_across_threads() {
    const COUNT: usize = 64;
    let source: Vec<u32> = (0..COUNT as u32).map(|i| i.wrapping_mul(0x9E37_79B9)).collect();
    // source -> ch0 -> sink0 -> staging -> ch1 -> sink1 -> destination
    let fabric = Fabric::new(
        vec![source.clone(), vec![0; COUNT], vec![0; COUNT]],
        vec![0, 1],
        vec![1, 2],
    );
    let engine: SharedDmaEngine<2, 2, 8> = SharedDmaEngine::new();

    {
        let mut dma = DmaController::new(&engine);
        dma.setup();
        for channel in 0..2 {
            dma.set_channel_sink_addr(channel, channel).unwrap();
            dma.enable_source_address_increment(channel, true).unwrap();
            dma.enable_dest_address_increment(channel, true).unwrap();
        }

        let count = COUNT as u32;
        dma.set_instruction(0, &InstructionConfig::new(0, 0, count).with_egress(1))
            .unwrap();
        dma.set_instruction(1, &InstructionConfig::new(0, 0, count).with_ingress(0))
            .unwrap();
        dma.set_channel_instruction_pointer(0, 0).unwrap();
        dma.set_channel_instruction_pointer(1, 1).unwrap();

        dma.enable_dma(true);
        // Start the consumer first so it has to park on the bond
        dma.enable_channel(1, true).unwrap();
        dma.enable_channel(0, true).unwrap();
    }

    let (producer, consumer) = thread::scope(|s| {
        let consumer = s.spawn(|| run_channel(&engine, &fabric, 1));
        let producer = s.spawn(|| run_channel(&engine, &fabric, 0));
        (producer.join().unwrap(), consumer.join().unwrap())
    });

    assert_eq!(producer, ChannelState::Halted);
    assert_eq!(consumer, ChannelState::Halted);
    assert_eq!(fabric.snapshot(2), source);
    assert_eq!(engine.with(|e| e.bond_tokens(1)), Ok(0));
}

#[test]
fn independent_channels_run_in_parallel() {
    const COUNT: u32 = 128;
    let fabric = Fabric::new(
        vec![(0..2 * COUNT).collect(), (1000..1000 + 2 * COUNT).collect()],
        vec![0, 1],
        vec![0, 1],
    );
    let engine: SharedDmaEngine<2, 2, 8> = SharedDmaEngine::new();

    {
        let mut dma = DmaController::new(&engine);
        dma.setup();
        for channel in 0..2 {
            dma.set_channel_sink_addr(channel, channel).unwrap();
            dma.enable_source_address_increment(channel, true).unwrap();
            dma.enable_dest_address_increment(channel, true).unwrap();
            dma.set_instruction(
                channel,
                &InstructionConfig::new(0, COUNT as u64 * WORD, COUNT),
            )
            .unwrap();
            dma.set_channel_instruction_pointer(channel, channel).unwrap();
        }
        dma.enable_interrupt_on_command_finish(true);
        dma.enable_dma(true);
        dma.enable_channel(0, true).unwrap();
        dma.enable_channel(1, true).unwrap();
    }

    let states = thread::scope(|s| {
        let workers: Vec<_> = (0..2)
            .map(|channel| {
                let (engine, fabric) = (&engine, &fabric);
                s.spawn(move || run_channel(engine, fabric, channel))
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .collect::<Vec<_>>()
    });
    assert_eq!(states, vec![ChannelState::Halted; 2]);

    for (index, base) in [(0usize, 0u32), (1, 1000)] {
        let memory = fabric.snapshot(index);
        let expected: Vec<u32> = (base..base + COUNT).collect();
        assert_eq!(&memory[COUNT as usize..], expected.as_slice());
    }

    let mut dma = DmaController::new(&engine);
    let status = dma.engine_status();
    assert!(status.command_finished);
    assert!(!status.busy);
}
