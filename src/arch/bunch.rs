use serde::{Deserialize, Serialize};

/// Describes how a bunch of vectors is laid out in a unit buffer.
///
/// Unit `i` of pattern `b` lives at `i * max_bunch_size + b`, only the first `cur_bunch_size`
/// patterns of each unit are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BunchConfig {
    pub max_bunch_size: usize,
    pub cur_bunch_size: usize,
}

impl BunchConfig {
    /// Creates a `BunchConfig` whose buffers are exactly as large as the bunch.
    pub fn exact(bunch_size: usize) -> Self {
        Self {
            max_bunch_size: bunch_size,
            cur_bunch_size: bunch_size,
        }
    }

    /// Creates a `BunchConfig` for buffers of `max_bunch_size` holding `cur_bunch_size` patterns.
    pub fn new(max_bunch_size: usize, cur_bunch_size: usize) -> Self {
        Self {
            max_bunch_size,
            cur_bunch_size: cur_bunch_size.min(max_bunch_size),
        }
    }
}
