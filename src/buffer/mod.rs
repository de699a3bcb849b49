pub mod blas;
mod mirrored;

pub use mirrored::{Coherence, MirroredBuffer};
