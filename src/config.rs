use serde::{Deserialize, Serialize};

/// Memory layout of buffers returned from reads.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryOrder {
    C,
    F,
}

impl Default for MemoryOrder {
    fn default() -> Self {
        Self::C
    }
}

const DEFAULT_CONCURRENCY: usize = 10;

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Per-instance runtime knobs for array operations.
///
/// `concurrency` bounds in-flight store operations per batched call; it does
/// not bound global concurrency across calls.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub order: MemoryOrder,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            order: MemoryOrder::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}
