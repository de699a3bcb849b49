mod model;
mod trainer;

pub use model::{ActFnSpec, ComponentSpec, ModelSpec};
pub use trainer::{InitSpec, LossFnSpec, TrainerSpec};
