//! A low level neural network runtime.
//!
//! Models are chains of components exchanging shared bunch tokens. Weight matrices live in a
//! registry and may be tied between components, their updates are aggregated behind a barrier
//! so every contributor trains against the same weights.

pub mod arch;
pub mod buffer;
pub mod error;
pub mod specs;
pub mod token;
pub mod weights;

pub use error::{AnnErr, Result};
