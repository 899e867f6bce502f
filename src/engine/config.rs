//! Engine model configuration

use crate::internal::constants::DEFAULT_QUANTUM_WORDS;

/// Build-time parameters of the modeled engine.
///
/// # Example
///
/// ```ignore
/// let config = EngineConfig::new().with_quantum_words(512);
/// let engine: DmaEngine<2, 2, 8> = DmaEngine::with_config(config);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// Words a quantum-respecting sink must receive before completion is released
    pub quantum_words: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a configuration with the default quantum
    pub const fn new() -> Self {
        Self {
            quantum_words: DEFAULT_QUANTUM_WORDS,
        }
    }

    /// Set the quantum size in words (0 is treated as 1)
    #[must_use]
    pub const fn with_quantum_words(mut self, words: u32) -> Self {
        self.quantum_words = if words == 0 { 1 } else { words };
        self
    }
}
