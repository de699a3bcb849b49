pub mod activations;
pub mod components;
pub mod loss;
mod bunch;
mod sequential;

pub use bunch::BunchConfig;
pub use sequential::Sequential;
