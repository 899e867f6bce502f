//! Critical-section protected engine shared between actors.
//!
//! [`SharedDmaEngine`] lets one context configure the engine through its
//! register window while other contexts (interrupt handlers, tasks or host
//! threads) drive individual channels with
//! [`poll_channel`](SharedDmaEngine::poll_channel).

use super::primitives::CriticalSectionCell;
#[cfg(feature = "async")]
use super::primitives::{AtomicWaker, WakerSet};
use crate::driver::bus::RegisterBus;
use crate::driver::error::ConfigResult;
use crate::engine::{DataBus, DmaEngine, EngineConfig};
#[cfg(feature = "async")]
use crate::{ChannelState, Error, TransferError};

/// Engine wrapper whose every access runs inside a critical section.
///
/// The register window is reachable through `&SharedDmaEngine`, so a host
/// driver can own a shared reference while worker contexts hold others:
///
/// ```ignore
/// static ENGINE: SharedDmaEngine<2, 2, 8> = SharedDmaEngine::new();
///
/// let mut dma = DmaController::new(&ENGINE);
/// dma.setup();
/// // ...configure and enable channels...
///
/// // one worker per channel
/// ENGINE.poll_channel(0, &mut bus)?;
/// ```
///
/// With the `async` feature, [`wait_halted`](Self::wait_halted) and
/// [`wait_error`](Self::wait_error) resolve from wakers fired by the polling
/// contexts.
pub struct SharedDmaEngine<const CHANNELS: usize, const SINKS: usize, const INSTRUCTIONS: usize> {
    inner: CriticalSectionCell<DmaEngine<CHANNELS, SINKS, INSTRUCTIONS>>,
    #[cfg(feature = "async")]
    halt_wakers: WakerSet<CHANNELS>,
    #[cfg(feature = "async")]
    error_waker: AtomicWaker,
}

impl<const CHANNELS: usize, const SINKS: usize, const INSTRUCTIONS: usize>
    SharedDmaEngine<CHANNELS, SINKS, INSTRUCTIONS>
{
    /// Create a shared engine (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self::with_config(EngineConfig::new())
    }

    /// Create a shared engine with an explicit configuration.
    pub const fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: CriticalSectionCell::new(DmaEngine::with_config(config)),
            #[cfg(feature = "async")]
            halt_wakers: WakerSet::new(),
            #[cfg(feature = "async")]
            error_waker: AtomicWaker::new(),
        }
    }

    /// Execute a closure with exclusive access to the engine.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut DmaEngine<CHANNELS, SINKS, INSTRUCTIONS>) -> R,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut DmaEngine<CHANNELS, SINKS, INSTRUCTIONS>) -> R,
    {
        self.inner.try_with(f)
    }

    /// Give every channel one tick.
    pub fn poll<B: DataBus + ?Sized>(&self, bus: &mut B) {
        self.inner.with(|engine| engine.poll(bus));
        self.wake_waiters();
    }

    /// Give one channel a tick.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `channel` is not a valid channel index.
    pub fn poll_channel<B: DataBus + ?Sized>(&self, channel: u32, bus: &mut B) -> ConfigResult<()> {
        self.inner.with(|engine| engine.poll_channel(channel, bus))?;
        self.wake_waiters();
        Ok(())
    }

    #[cfg(not(feature = "async"))]
    #[inline]
    fn wake_waiters(&self) {}

    #[cfg(feature = "async")]
    fn wake_waiters(&self) {
        let (settled, error) = self.inner.with_ref(|engine| {
            let mut settled = 0u32;
            for channel in 0..CHANNELS as u32 {
                let stopped = engine.channel_state(channel).is_ok_and(|s| !s.is_active());
                let faulted = engine.channel_error(channel).is_ok_and(|e| e.is_some());
                if stopped || faulted {
                    settled |= 1 << channel;
                }
            }
            (settled, engine.has_error())
        });

        self.halt_wakers.wake_mask(settled);
        if error {
            self.error_waker.wake();
        }
    }

    /// Wait until a channel stops running.
    ///
    /// Resolves with the channel's state once it is halted or idle, or with
    /// `Error::Transfer` if the channel stalled on a transfer error.
    ///
    /// # Errors
    ///
    /// - `Error::Config(OutOfRange)` if `channel` is not a valid channel index
    /// - `Error::Transfer(_)` if the channel latched a transfer error
    #[cfg(feature = "async")]
    pub async fn wait_halted(&self, channel: u32) -> crate::Result<ChannelState> {
        use core::future::poll_fn;
        use core::task::Poll;

        poll_fn(|cx| {
            self.halt_wakers.register(channel as usize, cx.waker());
            let result = self.inner.with_ref(|engine| -> ConfigResult<Option<crate::Result<ChannelState>>> {
                let state = engine.channel_state(channel)?;
                match engine.channel_error(channel)? {
                    Some(error) => Ok(Some(Err(Error::Transfer(error)))),
                    None if !state.is_active() => Ok(Some(Ok(state))),
                    None => Ok(None),
                }
            });

            match result {
                Ok(Some(outcome)) => Poll::Ready(outcome),
                Ok(None) => Poll::Pending,
                Err(e) => Poll::Ready(Err(Error::Config(e))),
            }
        })
        .await
    }

    /// Wait for any channel or sink to latch a transfer error.
    #[cfg(feature = "async")]
    pub async fn wait_error(&self) -> TransferError {
        use core::future::poll_fn;
        use core::task::Poll;

        poll_fn(|cx| {
            self.error_waker.register(cx.waker());
            match self.inner.with_ref(first_error) {
                Some(error) => Poll::Ready(error),
                None => Poll::Pending,
            }
        })
        .await
    }
}

/// First latched error, channels before sinks
#[cfg(feature = "async")]
fn first_error<const C: usize, const S: usize, const I: usize>(
    engine: &DmaEngine<C, S, I>,
) -> Option<TransferError> {
    let channels = (0..C as u32).filter_map(|c| engine.channel_error(c).ok().flatten());
    let sinks = (0..S as u32).filter_map(|s| engine.sink_error(s).ok().flatten());
    channels.chain(sinks).next()
}

impl<const CHANNELS: usize, const SINKS: usize, const INSTRUCTIONS: usize> Default
    for SharedDmaEngine<CHANNELS, SINKS, INSTRUCTIONS>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const CHANNELS: usize, const SINKS: usize, const INSTRUCTIONS: usize> RegisterBus
    for &SharedDmaEngine<CHANNELS, SINKS, INSTRUCTIONS>
{
    fn read_register(&mut self, addr: u32) -> u32 {
        self.inner.with(|engine| engine.read_register(addr))
    }

    fn write_register(&mut self, addr: u32, value: u32) {
        self.inner.with(|engine| engine.write_register(addr, value));
        // Disabling a channel settles it
        self.wake_waiters();
    }
}

/// Shared engine with the default table sizes (2 channels, 2 sinks, 8 instructions).
pub type SharedDmaEngineDefault = SharedDmaEngine<2, 2, 8>;

/// Shared engine with every table at its register-window maximum.
pub type SharedDmaEngineLarge = SharedDmaEngine<4, 4, 16>;

#[cfg(test)]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod tests {
    extern crate std;

    use super::*;
    use crate::driver::{DmaController, InstructionConfig};
    use crate::engine::ChannelState;
    use crate::testing::{MemoryBus, Port};

    fn rig(count: u32) -> (SharedDmaEngineDefault, MemoryBus, usize) {
        let shared = SharedDmaEngineDefault::new();
        let mut mem = MemoryBus::new(2, 2);
        let src = mem.add_memory_with((1..=count).collect());
        let fifo = mem.add_fifo();
        mem.map_channel(0, Port::Memory(src));
        mem.map_sink(0, Port::Fifo(fifo));

        let mut dma = DmaController::new(&shared);
        dma.setup();
        dma.enable_source_address_increment(0, true).unwrap();
        dma.set_instruction(0, &InstructionConfig::new(0, 0, count)).unwrap();
        dma.enable_dma(true);
        dma.enable_channel(0, true).unwrap();
        (shared, mem, fifo)
    }

    #[test]
    fn static_construction() {
        static ENGINE: SharedDmaEngine<2, 2, 8> = SharedDmaEngine::new();
        assert_eq!(ENGINE.with(|e| e.channel_count()), 2);
    }

    #[test]
    fn controller_configures_through_shared_reference() {
        let shared = SharedDmaEngineDefault::new();
        let mut dma = DmaController::new(&shared);
        assert_eq!(dma.channel_count(), 2);
        dma.set_channel_sink_addr(1, 1).unwrap();
        assert_eq!(dma.get_channel_sink_addr(1), Ok(1));
    }

    #[test]
    fn poll_channel_drives_one_channel() {
        let (shared, mut mem, fifo) = rig(4);
        for _ in 0..5 {
            shared.poll_channel(0, &mut mem).unwrap();
        }
        assert_eq!(mem.fifo(fifo), &[1, 2, 3, 4]);
        assert_eq!(shared.with(|e| e.channel_state(0)), Ok(ChannelState::Halted));
        assert!(shared.poll_channel(2, &mut mem).is_err());
    }

    #[test]
    fn try_with_fails_while_borrowed() {
        let shared = SharedDmaEngineDefault::new();
        let nested = shared.with(|_| shared.try_with(|e| e.is_busy()));
        assert_eq!(nested, None);
        assert_eq!(shared.try_with(|e| e.is_busy()), Some(false));
    }

    #[cfg(feature = "async")]
    mod waits {
        use super::*;
        use core::future::Future;
        use core::pin::pin;
        use core::task::{Context, Poll, Waker};
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::task::Wake;

        #[derive(Default)]
        struct WakeCounter(AtomicUsize);

        impl Wake for WakeCounter {
            fn wake(self: Arc<Self>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        #[test]
        fn wait_halted_resolves_after_poll() {
            let (shared, mut mem, _) = rig(2);
            let counter = Arc::new(WakeCounter::default());
            let waker = Waker::from(counter.clone());
            let mut cx = Context::from_waker(&waker);

            let mut wait = pin!(shared.wait_halted(0));
            assert!(wait.as_mut().poll(&mut cx).is_pending());

            for _ in 0..3 {
                shared.poll(&mut mem);
            }
            assert!(counter.0.load(Ordering::SeqCst) >= 1);
            assert_eq!(
                wait.as_mut().poll(&mut cx),
                Poll::Ready(Ok(ChannelState::Halted))
            );
        }

        #[test]
        fn wait_error_reports_sink_fault() {
            let (shared, mut mem, _) = rig(2);
            mem.map_sink(0, Port::Detached);
            let mut cx = Context::from_waker(Waker::noop());

            let mut wait = pin!(shared.wait_error());
            assert!(wait.as_mut().poll(&mut cx).is_pending());
            shared.poll(&mut mem);
            shared.poll(&mut mem);
            assert_eq!(
                wait.as_mut().poll(&mut cx),
                Poll::Ready(TransferError::SinkOutOfRange)
            );

            let mut halted = pin!(shared.wait_halted(0));
            assert_eq!(
                halted.as_mut().poll(&mut cx),
                Poll::Ready(Err(Error::Transfer(TransferError::SinkOutOfRange)))
            );
        }

        #[test]
        fn wait_halted_rejects_unknown_channel() {
            let shared = SharedDmaEngineDefault::new();
            let mut cx = Context::from_waker(Waker::noop());
            let mut wait = pin!(shared.wait_halted(9));
            assert!(matches!(
                wait.as_mut().poll(&mut cx),
                Poll::Ready(Err(Error::Config(_)))
            ));
        }
    }
}
