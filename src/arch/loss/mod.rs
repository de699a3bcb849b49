mod loss_fn;
mod mae;
mod mse;

pub use loss_fn::LossFn;
pub use mae::Mae;
pub use mse::Mse;

use crate::{AnnErr, Result, token::TokenRef};

/// Differences smaller than this are considered zero by the gradients.
pub const NEAR_ZERO: f32 = 1e-6;

/// The running mean of the losses added since the last reset.
#[derive(Debug, Clone, Copy, Default)]
struct LossAccum {
    sum: f32,
    count: usize,
}

impl LossAccum {
    fn add(&mut self, loss: f32) {
        self.sum += loss;
        self.count += 1;
    }

    fn mean(&self) -> f32 {
        if self.count == 0 {
            return 0.;
        }

        self.sum / self.count as f32
    }
}

/// Gives `f` host views of an output and a target token with their bunch size.
///
/// # Returns
/// An error if any token isn't a block, they hold a different amount of values or it isn't a
/// multiple of `size`.
fn with_pair<T, F>(output: &TokenRef, target: &TokenRef, size: usize, f: F) -> Result<T>
where
    F: FnOnce(&[f32], &[f32], usize) -> T,
{
    if std::rc::Rc::ptr_eq(output, target) {
        let mut token = output.borrow_mut();
        let o = token.as_block_mut("output")?;
        let bunch_size = bunch_size_of(o.used_size(), size)?;
        let o = o.read();
        return Ok(f(o, o, bunch_size));
    }

    let mut output = output.borrow_mut();
    let mut target = target.borrow_mut();
    let o = output.as_block_mut("output")?;
    let t = target.as_block_mut("target")?;

    if o.used_size() != t.used_size() {
        return Err(AnnErr::SizeMismatch {
            a: "output",
            b: "target",
            got: o.used_size(),
            expected: t.used_size(),
        });
    }

    let bunch_size = bunch_size_of(o.used_size(), size)?;
    Ok(f(o.read(), t.read(), bunch_size))
}

fn bunch_size_of(used: usize, size: usize) -> Result<usize> {
    if used == 0 || used % size != 0 {
        return Err(AnnErr::SizeMismatch {
            a: "output",
            b: "loss size",
            got: used,
            expected: size,
        });
    }

    Ok(used / size)
}
