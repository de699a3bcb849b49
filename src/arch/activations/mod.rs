mod act_fn;
mod binary_sampling;
mod logistic;
mod softmax;
mod tanh;

pub use act_fn::ActFn;
pub use binary_sampling::BinarySampling;
pub use logistic::Logistic;
pub use softmax::Softmax;
pub use tanh::Tanh;

use crate::{AnnErr, Result, arch::BunchConfig};

/// Validates that a unit buffer of `len` scalars can hold `size` units of the given bunch.
fn check_units(len: usize, size: usize, conf: &BunchConfig) -> Result<()> {
    if size == 0 || conf.max_bunch_size == 0 {
        return Err(AnnErr::ZeroSize { what: "units" });
    }

    let expected = size * conf.max_bunch_size;
    if len < expected {
        return Err(AnnErr::SizeMismatch {
            a: "units buffer",
            b: "units times bunch",
            got: len,
            expected,
        });
    }

    Ok(())
}

/// Applies `f` to every meaningful unit value.
fn map_units<F>(units: &mut [f32], size: usize, conf: &BunchConfig, mut f: F)
where
    F: FnMut(f32) -> f32,
{
    for i in 0..size {
        let start = i * conf.max_bunch_size;
        units[start..start + conf.cur_bunch_size]
            .iter_mut()
            .for_each(|x| *x = f(*x));
    }
}

/// Multiplies every meaningful error value by `df` evaluated at the matching output.
fn multiply_units<F>(units: &[f32], errors: &mut [f32], size: usize, conf: &BunchConfig, df: F)
where
    F: Fn(f32) -> f32,
{
    for i in 0..size {
        let start = i * conf.max_bunch_size;
        let end = start + conf.cur_bunch_size;
        errors[start..end]
            .iter_mut()
            .zip(&units[start..end])
            .for_each(|(e, &y)| *e *= df(y));
    }
}
