//! Long-running double-buffer streams against the engine model.

use bonded_dma::{
    ChannelId, ChannelState, ControllerConfig, DataBus, DmaController, DmaEngine, DmaEngineLarge,
    PortError, PortResult, SinkId,
};

const WORD: u64 = 4;

/// Producer channel reads a generator, the buffer memory sits behind one sink
/// and one channel, and the final sink appends to `output`.
struct Stream {
    producer: usize,
    consumer: usize,
    buffer_sink: usize,
    output_sink: usize,
    next: u32,
    produced: Vec<u32>,
    buffers: Vec<u32>,
    output: Vec<u32>,
}

impl Stream {
    fn new(
        words: usize,
        producer: usize,
        consumer: usize,
        buffer_sink: usize,
        output_sink: usize,
    ) -> Self {
        Self {
            producer,
            consumer,
            buffer_sink,
            output_sink,
            next: 0x1000,
            produced: Vec::new(),
            buffers: vec![0; words],
            output: Vec::new(),
        }
    }

    fn buffer_index(&self, addr: u64) -> PortResult<usize> {
        let index = (addr / WORD) as usize;
        if addr % WORD == 0 && index < self.buffers.len() {
            Ok(index)
        } else {
            Err(PortError::OutOfRange)
        }
    }
}

impl DataBus for Stream {
    fn read_word(&mut self, channel: ChannelId, addr: u64) -> PortResult<u32> {
        if channel.index() == self.producer {
            // Mix the sequence so equal values cannot hide reordering
            self.next = self.next.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            self.produced.push(self.next);
            Ok(self.next)
        } else if channel.index() == self.consumer {
            let index = self.buffer_index(addr)?;
            Ok(self.buffers[index])
        } else {
            Err(PortError::OutOfRange)
        }
    }

    fn write_word(&mut self, sink: SinkId, addr: u64, word: u32) -> PortResult<()> {
        if sink.index() == self.buffer_sink {
            let index = self.buffer_index(addr)?;
            self.buffers[index] = word;
            Ok(())
        } else if sink.index() == self.output_sink {
            self.output.push(word);
            Ok(())
        } else {
            Err(PortError::OutOfRange)
        }
    }
}

#[test]
fn stream_preserves_order_over_many_rounds() {
    const N: u32 = 32;
    let mut engine: DmaEngine<2, 2, 8> = DmaEngine::new();
    let mut stream = Stream::new(2 * N as usize, 0, 1, 0, 1);

    let mut dma = DmaController::new(&mut engine);
    dma.setup();
    dma.setup_double_buffer(0, 0, 1, 0, 1, 0x0, 0x0, 0x0, N as u64 * WORD, N)
        .unwrap();
    dma.enable_dma(true);
    dma.enable_channel(0, true).unwrap();
    dma.enable_channel(1, true).unwrap();

    for _ in 0..100 * (N as usize + 1) {
        engine.poll(&mut stream);
    }

    assert!(stream.output.len() >= 90 * N as usize);
    assert_eq!(stream.output.as_slice(), &stream.produced[..stream.output.len()]);
    assert!(!engine.has_error());
    assert_eq!(engine.channel_state(0).map(|s| s.is_active()), Ok(true));
    assert_eq!(engine.channel_state(1).map(|s| s.is_active()), Ok(true));
}

#[test]
fn stream_on_upper_slots_of_large_table() {
    const N: u32 = 5;
    let mut engine = DmaEngineLarge::new();
    // Producer on channel 3 into sink 2, consumer on channel 1 into sink 0
    let mut stream = Stream::new(2 * N as usize + 3, 3, 1, 2, 0);

    let config = ControllerConfig::new().with_instruction_count(16);
    let mut dma = DmaController::with_config(&mut engine, config).unwrap();
    dma.setup();
    dma.setup_double_buffer(12, 3, 0, 2, 1, 0x0, 0x0, 3 * WORD, (3 + N as u64) * WORD, N)
        .unwrap();
    dma.enable_dma(true);
    dma.enable_channel(3, true).unwrap();
    dma.enable_channel(1, true).unwrap();

    for _ in 0..40 * (N as usize + 1) {
        engine.poll(&mut stream);
    }

    assert!(stream.output.len() >= 30 * N as usize);
    assert_eq!(stream.output.as_slice(), &stream.produced[..stream.output.len()]);
    // The three words below buf0 are never touched
    assert_eq!(&stream.buffers[..3], &[0, 0, 0]);
}

#[test]
fn disabling_consumer_parks_stream() {
    const N: u32 = 4;
    let mut engine: DmaEngine<2, 2, 8> = DmaEngine::new();
    let mut stream = Stream::new(2 * N as usize, 0, 1, 0, 1);

    let mut dma = DmaController::new(&mut engine);
    dma.setup_double_buffer(4, 0, 1, 0, 1, 0x0, 0x0, 0x0, N as u64 * WORD, N)
        .unwrap();
    dma.enable_dma(true);
    dma.enable_channel(0, true).unwrap();
    dma.enable_channel(1, true).unwrap();

    for _ in 0..10 * (N as usize + 1) {
        engine.poll(&mut stream);
    }
    let delivered = stream.output.len();
    assert!(delivered > 0);

    let mut dma = DmaController::new(&mut engine);
    dma.enable_channel(1, false).unwrap();
    let status = dma.channel_status(1).unwrap();
    assert!(!status.active);
    assert!(!status.halted);

    for _ in 0..10 * (N as usize + 1) {
        engine.poll(&mut stream);
    }
    assert_eq!(stream.output.len(), delivered);
    assert_eq!(engine.channel_state(1), Ok(ChannelState::Idle));
    // Completions of the producer halves pile up as tokens for the consumer
    assert!(engine.bond_tokens(6).unwrap() + engine.bond_tokens(7).unwrap() > 0);
}
