//! Completion signalling between bonded instructions
//!
//! A finished instruction posts a token to every instruction bonded to it. An
//! instruction with its ingress bond enabled consumes one token before it may
//! start, so the consumer of a buffer can never overtake the producer that
//! fills it.
//!
//! Sinks that respect the data quantum delay those posts: completions are
//! parked in a [`QuantumGate`] until the sink has absorbed a whole quantum.

use super::table::{InstructionId, TableIndex};

// =============================================================================
// Bond Latches
// =============================================================================

/// Pending completion tokens, one counter per instruction slot.
#[derive(Debug, Clone)]
pub(crate) struct BondLatches<const N: usize> {
    tokens: [u32; N],
}

impl<const N: usize> BondLatches<N> {
    pub const fn new() -> Self {
        Self { tokens: [0; N] }
    }

    /// Post one completion token to `target`
    #[inline]
    pub fn post(&mut self, target: InstructionId) {
        let slot = &mut self.tokens[target.index()];
        *slot = slot.saturating_add(1);
    }

    /// Consume a token for `target` if one is available
    #[inline]
    pub fn take(&mut self, target: InstructionId) -> bool {
        let slot = &mut self.tokens[target.index()];
        if *slot == 0 {
            false
        } else {
            *slot -= 1;
            true
        }
    }

    /// Tokens waiting for `target`
    #[inline]
    pub fn pending(&self, target: InstructionId) -> u32 {
        self.tokens[target.index()]
    }

    /// Drop every token waiting for `target`
    #[inline]
    pub fn clear(&mut self, target: InstructionId) {
        self.tokens[target.index()] = 0;
    }
}

// =============================================================================
// Quantum Gate
// =============================================================================

/// Per-sink quantum accounting.
///
/// `fill` counts words written since the last quantum boundary. Completions
/// raised while `fill != 0` are parked in `deferred` and released together
/// when the next boundary is crossed.
#[derive(Debug, Clone)]
pub(crate) struct QuantumGate<const N: usize> {
    fill: u32,
    deferred: [u32; N],
}

impl<const N: usize> QuantumGate<N> {
    pub const fn new() -> Self {
        Self {
            fill: 0,
            deferred: [0; N],
        }
    }

    /// Account for one written word. Returns `true` when a boundary was crossed.
    #[inline]
    pub fn record_word(&mut self, quantum: u32) -> bool {
        self.fill += 1;
        if self.fill >= quantum {
            self.fill = 0;
            true
        } else {
            false
        }
    }

    /// The sink sits exactly on a quantum boundary
    #[inline]
    pub fn at_boundary(&self) -> bool {
        self.fill == 0
    }

    /// Park a completion of `source` until the next boundary
    #[inline]
    pub fn defer(&mut self, source: InstructionId) {
        let slot = &mut self.deferred[source.index()];
        *slot = slot.saturating_add(1);
    }

    /// A partial quantum or parked completion is outstanding
    pub fn is_pending(&self) -> bool {
        self.fill != 0 || self.deferred.iter().any(|&n| n != 0)
    }

    /// Hand every parked completion to `release`, emptying the gate's backlog.
    pub fn drain(&mut self, mut release: impl FnMut(InstructionId, u32)) {
        for (i, slot) in self.deferred.iter_mut().enumerate() {
            if *slot != 0 {
                let n = core::mem::take(slot);
                release(InstructionId::from_checked(i as u8), n);
            }
        }
    }

    /// Forget the partial quantum (parked completions are kept)
    pub fn reset_fill(&mut self) {
        self.fill = 0;
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;

    fn id(raw: u8) -> InstructionId {
        InstructionId::from_checked(raw)
    }

    #[test]
    fn tokens_are_consumed_one_at_a_time() {
        let mut latches: BondLatches<4> = BondLatches::new();
        assert!(!latches.take(id(2)));

        latches.post(id(2));
        latches.post(id(2));
        assert_eq!(latches.pending(id(2)), 2);
        assert!(latches.take(id(2)));
        assert!(latches.take(id(2)));
        assert!(!latches.take(id(2)));
    }

    #[test]
    fn clear_drops_only_the_named_slot() {
        let mut latches: BondLatches<4> = BondLatches::new();
        latches.post(id(0));
        latches.post(id(1));
        latches.clear(id(0));
        assert_eq!(latches.pending(id(0)), 0);
        assert_eq!(latches.pending(id(1)), 1);
    }

    #[test]
    fn gate_crosses_boundary_every_quantum() {
        let mut gate: QuantumGate<4> = QuantumGate::new();
        assert!(gate.at_boundary());
        assert!(!gate.record_word(3));
        assert!(!gate.record_word(3));
        assert!(!gate.at_boundary());
        assert!(gate.record_word(3));
        assert!(gate.at_boundary());
    }

    #[test]
    fn gate_drains_deferred_completions() {
        let mut gate: QuantumGate<4> = QuantumGate::new();
        gate.record_word(8);
        gate.defer(id(1));
        gate.defer(id(1));
        gate.defer(id(3));
        assert!(gate.is_pending());

        let mut released = Vec::new();
        gate.drain(|inst, n| released.push((inst.index(), n)));
        assert_eq!(released, [(1, 2), (3, 1)]);

        gate.reset_fill();
        assert!(!gate.is_pending());
    }
}
