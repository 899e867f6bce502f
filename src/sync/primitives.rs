//! Critical-section primitives shared by the engine wrappers.

use core::cell::RefCell;
#[cfg(feature = "async")]
use core::task::Waker;
use critical_section::Mutex;

/// `RefCell` behind a `critical_section::Mutex`.
///
/// Every access runs inside a critical section, so the same value can be
/// reached from interrupt handlers, tasks and (with the `std` implementation)
/// host threads.
pub struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Create a new cell (const, suitable for static initialization).
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access.
    ///
    /// # Panics
    ///
    /// Panics if called re-entrantly from inside another `with` on the same
    /// cell.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Run `f` with exclusive access, or return `None` if the cell is
    /// already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow_mut()
                .ok()
                .map(|mut value| f(&mut value))
        })
    }

    /// Run `f` with shared access.
    #[inline]
    pub fn with_ref<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        critical_section::with(|cs| f(&self.inner.borrow_ref(cs)))
    }
}

/// Waker slot that can be filled from a task and drained from `poll`.
#[cfg(feature = "async")]
pub struct AtomicWaker {
    waker: CriticalSectionCell<Option<Waker>>,
}

#[cfg(feature = "async")]
impl AtomicWaker {
    /// Create an empty slot (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            waker: CriticalSectionCell::new(None),
        }
    }

    /// Store `waker`, replacing any previous one that would not wake the
    /// same task.
    pub fn register(&self, waker: &Waker) {
        self.waker.with(|slot| match slot {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        });
    }

    /// Wake and clear the stored waker, if any.
    #[inline]
    pub fn wake(&self) {
        if let Some(waker) = self.waker.with(Option::take) {
            waker.wake();
        }
    }

    /// Check whether a waker is stored
    pub fn is_registered(&self) -> bool {
        self.waker.with_ref(Option::is_some)
    }
}

#[cfg(feature = "async")]
impl Default for AtomicWaker {
    fn default() -> Self {
        Self::new()
    }
}

/// One [`AtomicWaker`] per channel.
#[cfg(feature = "async")]
pub struct WakerSet<const N: usize> {
    slots: [AtomicWaker; N],
}

#[cfg(feature = "async")]
impl<const N: usize> WakerSet<N> {
    /// Create a set of empty slots
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicWaker::new() }; N],
        }
    }

    /// Register `waker` for slot `index`. Out-of-range indices are ignored.
    pub fn register(&self, index: usize, waker: &Waker) {
        if let Some(slot) = self.slots.get(index) {
            slot.register(waker);
        }
    }

    /// Wake slot `index`
    pub fn wake(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            slot.wake();
        }
    }

    /// Wake every slot whose bit is set in `mask`
    pub fn wake_mask(&self, mask: u32) {
        for (index, slot) in self.slots.iter().enumerate() {
            if index < 32 && mask & (1 << index) != 0 {
                slot.wake();
            }
        }
    }
}

#[cfg(feature = "async")]
impl<const N: usize> Default for WakerSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn cell_mutates_in_place() {
        let cell = CriticalSectionCell::new(1u32);
        cell.with(|v| *v += 10);
        assert_eq!(cell.with_ref(|v| *v), 11);
        assert_eq!(cell.try_with(|v| *v * 2), Some(22));
    }

    #[test]
    fn cell_rejects_nested_try_with() {
        let cell = CriticalSectionCell::new(0u32);
        let nested = cell.with(|_| cell.try_with(|v| *v));
        assert_eq!(nested, None);
    }

    #[test]
    fn cell_in_static() {
        static CELL: CriticalSectionCell<u32> = CriticalSectionCell::new(0);
        CELL.with(|v| *v = 100);
        assert_eq!(CELL.with_ref(|v| *v), 100);
    }

    #[cfg(feature = "async")]
    mod wakers {
        use super::*;
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

        fn counter() -> (Arc<WakeCounter>, Waker) {
            let counter = Arc::new(WakeCounter::default());
            (counter.clone(), Waker::from(counter))
        }

        #[test]
        fn wake_clears_slot() {
            let slot = AtomicWaker::new();
            let (count, waker) = counter();
            assert!(!slot.is_registered());

            slot.register(&waker);
            assert!(slot.is_registered());
            slot.wake();
            slot.wake();
            assert!(!slot.is_registered());
            assert_eq!(count.0.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn set_wakes_selected_slots() {
            let set: WakerSet<3> = WakerSet::new();
            let (a, wa) = counter();
            let (b, wb) = counter();
            set.register(0, &wa);
            set.register(2, &wb);
            set.register(7, &wb);

            set.wake_mask(0b100);
            assert_eq!(a.0.load(Ordering::SeqCst), 0);
            assert_eq!(b.0.load(Ordering::SeqCst), 1);

            set.wake(0);
            assert_eq!(a.0.load(Ordering::SeqCst), 1);
        }
    }
}
