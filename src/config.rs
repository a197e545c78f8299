//! Bridge configuration properties.

use rustc_hash::FxHashMap;

/// Tunable behaviour of a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeProperty {
    /// Retry with fewer arguments when a receiver rejects the argument count.
    ArityFallback,
    /// Upper bound on arity retries per invocation; 0 means unbounded.
    MaxArityRetries,
    /// Hold opaque callables strongly instead of observing them weakly.
    KeepPlainCallablesAlive,
    /// Skip emission when the native side reports the transmitter's signals
    /// as blocked.
    HonourBlockedSignals,
}

impl BridgeProperty {
    pub fn default_value(&self) -> usize {
        match self {
            BridgeProperty::ArityFallback => 1,
            BridgeProperty::MaxArityRetries => 0,
            BridgeProperty::KeepPlainCallablesAlive => 1,
            BridgeProperty::HonourBlockedSignals => 1,
        }
    }
}

/// Property values, falling back to [`BridgeProperty::default_value`].
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    values: FxHashMap<BridgeProperty, usize>,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: BridgeProperty, value: usize) -> Self {
        self.set(property, value);
        self
    }

    pub fn set(&mut self, property: BridgeProperty, value: usize) {
        self.values.insert(property, value);
    }

    pub fn get(&self, property: BridgeProperty) -> usize {
        self.values
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_value())
    }

    pub fn flag(&self, property: BridgeProperty) -> bool {
        self.get(property) != 0
    }

    /// Maximum number of arguments that may be dropped in one invocation.
    pub fn retry_limit(&self) -> Option<usize> {
        if !self.flag(BridgeProperty::ArityFallback) {
            return Some(0);
        }
        match self.get(BridgeProperty::MaxArityRetries) {
            0 => None,
            limit => Some(limit),
        }
    }
}
