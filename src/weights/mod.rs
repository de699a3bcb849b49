mod matrix;
mod registry;

pub use matrix::{WEIGHT_NEAR_ZERO, WeightMatrix};
pub use registry::{WeightId, WeightRegistry};
