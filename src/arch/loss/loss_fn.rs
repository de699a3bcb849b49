use crate::{Result, token::TokenRef};

/// A loss function over bunches of `size` long vectors.
///
/// Losses are accumulated between resets, `accum_loss` gives their mean.
pub trait LossFn {
    /// Returns the size of the vectors this loss compares.
    fn size(&self) -> usize;

    /// Computes the loss of a bunch averaged over its patterns and accumulates it.
    ///
    /// # Arguments
    /// * `output` - The output of the model.
    /// * `target` - The expected output.
    ///
    /// # Returns
    /// The bunch loss or an error if the tokens aren't blocks of the same size.
    fn add_loss(&mut self, output: &TokenRef, target: &TokenRef) -> Result<f32>;

    /// Computes the error token seeding a backward pass, shaped like `output`.
    fn compute_gradient(&mut self, output: &TokenRef, target: &TokenRef) -> Result<TokenRef>;

    /// Returns the mean of the losses added since the last reset, zero if there's none.
    fn accum_loss(&self) -> f32;

    /// Clears the accumulated losses and releases the error token.
    fn reset(&mut self);
}
