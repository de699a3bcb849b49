use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use super::ModelSpec;
use crate::{
    Result,
    arch::{
        Sequential,
        loss::{LossFn, Mae, Mse},
    },
};

/// The specification for the `LossFn` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    Mse,
    Mae,
}

impl LossFnSpec {
    /// Creates the loss function for vectors of `size` values.
    pub fn build(self, size: usize) -> Result<Box<dyn LossFn>> {
        Ok(match self {
            LossFnSpec::Mse => Box::new(Mse::new(size)?),
            LossFnSpec::Mae => Box::new(Mae::new(size)?),
        })
    }
}

/// The weight initialization range, bounds are away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitSpec {
    pub low: f32,
    pub high: f32,
    pub seed: Option<u64>,
}

/// The specification for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSpec {
    pub model: ModelSpec,
    pub loss: LossFnSpec,
    pub learning_rate: f32,
    #[serde(default)]
    pub momentum: f32,
    #[serde(default)]
    pub weight_decay: f32,
    pub epochs: NonZeroUsize,
    pub init: InitSpec,
}

impl TrainerSpec {
    /// Sets the hyperparameters of this spec on every weighted component of `model`.
    pub fn configure(&self, model: &mut Sequential) -> Result<()> {
        model.set_option("learning_rate", self.learning_rate as f64)?;
        model.set_option("momentum", self.momentum as f64)?;
        model.set_option("weight_decay", self.weight_decay as f64)
    }
}
