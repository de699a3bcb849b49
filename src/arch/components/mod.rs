mod activation;
mod bias;
mod component;
mod dense;
mod options;

pub use activation::ActivationComponent;
pub use bias::BiasComponent;
pub use component::Component;
pub use dense::DenseComponent;
pub use options::{ComponentDict, Hyperparams};

use crate::{
    AnnErr, Result,
    buffer::blas,
    token::{TokenBlock, TokenRef},
    weights::{WeightId, WeightMatrix, WeightRegistry},
};

/// Returns the amount of patterns in a token of `used` scalars made of `size` long vectors.
fn bunch_size_of(used: usize, size: usize, what: &'static str) -> Result<usize> {
    if used == 0 || size == 0 || used % size != 0 {
        return Err(AnnErr::SizeMismatch {
            a: what,
            b: "component size",
            got: used,
            expected: size,
        });
    }

    Ok(used / size)
}

/// Validates that a token holds exactly `expected` scalars.
fn check_used(used: usize, expected: usize, what: &'static str) -> Result<()> {
    if used != expected {
        return Err(AnnErr::SizeMismatch {
            a: what,
            b: "bunch times component size",
            got: used,
            expected,
        });
    }

    Ok(())
}

fn not_built(component: &str) -> AnnErr {
    AnnErr::NotBuilt {
        component: component.to_string(),
    }
}

fn missing_token(component: &str, what: &'static str) -> AnnErr {
    AnnErr::MissingToken {
        component: component.to_string(),
        what,
    }
}

fn empty_token() -> TokenRef {
    TokenBlock::new(0).into_ref()
}

/// Resolves the matrix of a component, which must have been built against `weights`.
fn matrix_of<'a>(
    weights: &'a mut WeightRegistry,
    id: Option<WeightId>,
    component: &str,
) -> Result<&'a mut WeightMatrix> {
    id.and_then(|id| weights.get_mut(id))
        .ok_or_else(|| not_built(component))
}

/// Resolves `weights_name` in `weights` and registers one more reference to it.
fn bind_weights(
    weights: &mut WeightRegistry,
    weights_name: &str,
    num_inputs: usize,
    num_outputs: usize,
) -> Result<WeightId> {
    let id = weights.get_or_insert(weights_name, num_inputs, num_outputs)?;
    let matrix = matrix_of(weights, Some(id), weights_name)?;
    matrix.count_reference();
    Ok(id)
}

/// Makes `into` hold the matrix a component is bound to under `weights_name`.
///
/// # Returns
/// A `WeightsNotShared` error if `into` already holds a different matrix with that name.
fn export_weights(
    component: &str,
    weights_name: &str,
    id: Option<WeightId>,
    from: &WeightRegistry,
    into: &mut WeightRegistry,
) -> Result<()> {
    let matrix = id
        .and_then(|id| from.get(id))
        .ok_or_else(|| not_built(component))?;

    let Some(other) = into.id_of(weights_name).and_then(|id| into.get(id)) else {
        into.insert(weights_name, matrix.clone());
        return Ok(());
    };

    if other
        .check_sizes(matrix.num_inputs(), matrix.num_outputs())
        .is_err()
    {
        return Err(AnnErr::WeightsNotShared {
            name: weights_name.to_string(),
        });
    }

    Ok(())
}

/// Zeroes the whole capacity of an output token.
fn zero_token(token: &TokenRef, use_device: bool) -> Result<()> {
    let mut token = token.borrow_mut();
    let block = token.as_block_mut("output")?;
    let n = block.max_size();
    blas::fill(n, 0., block.buffer_mut(), 0, 1, use_device);
    Ok(())
}
