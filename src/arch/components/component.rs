use log::trace;

use super::{ActivationComponent, BiasComponent, ComponentDict, DenseComponent};
use crate::{
    Result,
    arch::activations::ActFn,
    token::TokenRef,
    weights::WeightRegistry,
};

/// A stage of a model.
///
/// Every component goes through `build` once, then alternates `forward`, `backward` and
/// `update` calls, with `reset` bringing it back to a clean forward ready state.
#[derive(Debug, Clone)]
pub enum Component {
    Bias(BiasComponent),
    Dense(DenseComponent),
    Activation(ActivationComponent),
}

impl Component {
    pub fn bias(name: &str, weights_name: &str) -> Self {
        Self::Bias(BiasComponent::new(name, weights_name))
    }

    pub fn dense(name: &str, weights_name: &str, output_size: usize) -> Self {
        Self::Dense(DenseComponent::new(name, weights_name, output_size))
    }

    pub fn activation(name: &str, act_fn: ActFn) -> Self {
        Self::Activation(ActivationComponent::new(name, act_fn))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Bias(c) => c.name(),
            Self::Dense(c) => c.name(),
            Self::Activation(c) => c.name(),
        }
    }

    /// Returns the name of the weights the component is trained through, if any.
    pub fn weights_name(&self) -> Option<&str> {
        match self {
            Self::Bias(c) => Some(c.weights_name()),
            Self::Dense(c) => Some(c.weights_name()),
            Self::Activation(_) => None,
        }
    }

    pub fn input_size(&self) -> usize {
        match self {
            Self::Bias(c) => c.size(),
            Self::Dense(c) => c.input_size(),
            Self::Activation(c) => c.size(),
        }
    }

    pub fn output_size(&self) -> usize {
        match self {
            Self::Bias(c) => c.size(),
            Self::Dense(c) => c.output_size(),
            Self::Activation(c) => c.size(),
        }
    }

    /// Returns the output size fixed at construction, size preserving components have none.
    pub fn declared_output_size(&self) -> Option<usize> {
        match self {
            Self::Dense(c) => Some(c.output_size()),
            Self::Bias(_) | Self::Activation(_) => None,
        }
    }

    /// Returns the bunch size of the last forward pass.
    pub fn bunch_size(&self) -> usize {
        match self {
            Self::Bias(c) => c.bunch_size(),
            Self::Dense(c) => c.bunch_size(),
            Self::Activation(c) => c.bunch_size(),
        }
    }

    /// Builds the component, resolving and counting its weights in `weights`.
    ///
    /// # Arguments
    /// * `input_size` - The size of the input vectors.
    /// * `output_size` - The size of the output vectors.
    /// * `weights` - The registry holding every weight matrix of the model.
    /// * `components` - The names and shapes of the already built components.
    pub fn build(
        &mut self,
        input_size: usize,
        output_size: usize,
        weights: &mut WeightRegistry,
        components: &mut ComponentDict,
    ) -> Result<()> {
        match self {
            Self::Bias(c) => c.build(input_size, output_size, weights, components),
            Self::Dense(c) => c.build(input_size, output_size, weights, components),
            Self::Activation(c) => c.build(input_size, output_size, components),
        }
    }

    /// Makes a forward pass over a bunch.
    ///
    /// # Arguments
    /// * `weights` - The registry the component was built against.
    /// * `input` - A block token holding the bunch.
    /// * `training` - Whether the pass is part of a training step.
    ///
    /// # Returns
    /// The output token, shared with the component until the next forward pass.
    pub fn forward(
        &mut self,
        weights: &mut WeightRegistry,
        input: TokenRef,
        training: bool,
    ) -> Result<TokenRef> {
        trace!(training = training; "forward through '{}'", self.name());

        match self {
            Self::Bias(c) => c.forward(weights, input),
            Self::Dense(c) => c.forward(weights, input),
            Self::Activation(c) => c.forward(input),
        }
    }

    /// Makes a backward pass, recording `error` for the next update.
    ///
    /// # Returns
    /// The error with respect to the input of the component.
    pub fn backward(&mut self, weights: &mut WeightRegistry, error: TokenRef) -> Result<TokenRef> {
        match self {
            Self::Bias(c) => c.backward(error),
            Self::Dense(c) => c.backward(weights, error),
            Self::Activation(c) => c.backward(error),
        }
    }

    /// Contributes the recorded gradient to the shared weights.
    pub fn update(&mut self, weights: &mut WeightRegistry) -> Result<()> {
        match self {
            Self::Bias(c) => c.update(weights),
            Self::Dense(c) => c.update(weights),
            Self::Activation(_) => Ok(()),
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        match self {
            Self::Bias(c) => c.reset(),
            Self::Dense(c) => c.reset(),
            Self::Activation(c) => c.reset(),
        }
    }

    /// Makes `into` hold the weights of this component under its weights name.
    pub fn copy_weights(&self, from: &WeightRegistry, into: &mut WeightRegistry) -> Result<()> {
        match self {
            Self::Bias(c) => c.copy_weights(from, into),
            Self::Dense(c) => c.copy_weights(from, into),
            Self::Activation(_) => Ok(()),
        }
    }

    pub fn has_option(&self, option: &str) -> bool {
        match self {
            Self::Bias(c) => c.has_option(option),
            Self::Dense(c) => c.has_option(option),
            Self::Activation(c) => c.has_option(option),
        }
    }

    pub fn set_option(&mut self, option: &str, value: f64) -> Result<()> {
        match self {
            Self::Bias(c) => c.set_option(option, value),
            Self::Dense(c) => c.set_option(option, value),
            Self::Activation(c) => c.set_option(option, value),
        }
    }

    pub fn get_option(&self, option: &str) -> Result<f64> {
        match self {
            Self::Bias(c) => c.get_option(option),
            Self::Dense(c) => c.get_option(option),
            Self::Activation(c) => c.get_option(option),
        }
    }
}
