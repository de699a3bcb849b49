use super::check_units;
use crate::{AnnErr, Result, arch::BunchConfig, buffer::MirroredBuffer};

/// Device side scratch space for the tree reductions, one power of two long row per pattern.
#[derive(Debug)]
struct Scratch {
    reduction_size: usize,
    max_bunch_size: usize,
    maxima: MirroredBuffer,
    shifted: MirroredBuffer,
    sums: MirroredBuffer,
}

impl Scratch {
    fn new(size: usize, max_bunch_size: usize) -> Self {
        let reduction_size = size.next_power_of_two();
        let len = reduction_size * max_bunch_size;

        Self {
            reduction_size,
            max_bunch_size,
            maxima: MirroredBuffer::new(len),
            shifted: MirroredBuffer::new(len),
            sums: MirroredBuffer::new(len),
        }
    }
}

/// A numerically stable per vector softmax.
///
/// An instance locks its vector size the first time it is applied, using it again with another
/// size is an error.
#[derive(Debug, Default)]
pub struct Softmax {
    size: usize,
    scratch: Option<Scratch>,
}

impl Softmax {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the locked vector size, if any.
    pub fn locked_size(&self) -> Option<usize> {
        (self.size != 0).then_some(self.size)
    }

    pub fn apply(
        &mut self,
        units: &mut MirroredBuffer,
        size: usize,
        conf: &BunchConfig,
        use_device: bool,
    ) -> Result<()> {
        check_units(units.len(), size, conf)?;

        if self.size == 0 {
            self.size = size;
        } else if self.size != size {
            return Err(AnnErr::SoftmaxSizeLocked {
                locked: self.size,
                got: size,
            });
        }

        if use_device {
            self.apply_device(units, size, conf);
        } else {
            apply_host(units.read_write(), size, conf);
        }

        Ok(())
    }

    fn apply_device(&mut self, units: &mut MirroredBuffer, size: usize, conf: &BunchConfig) {
        let scratch = match self.scratch.take() {
            Some(s) if s.max_bunch_size >= conf.max_bunch_size => s,
            _ => Scratch::new(size, conf.max_bunch_size),
        };
        let scratch = self.scratch.insert(scratch);

        let red = scratch.reduction_size;
        let u = units.device_read_write();
        let maxima = scratch.maxima.device_write();
        let shifted = scratch.shifted.device_write();
        let sums = scratch.sums.device_write();
        let stride = conf.max_bunch_size;

        for b in 0..conf.cur_bunch_size {
            let row = b * red..(b + 1) * red;

            let m = &mut maxima[row.clone()];
            m.fill(f32::NEG_INFINITY);
            (0..size).for_each(|i| m[i] = u[i * stride + b]);
            let max = tree_reduce(m, f32::max);

            let e = &mut shifted[row.clone()];
            e.fill(0.);
            (0..size).for_each(|i| e[i] = (u[i * stride + b] - max).exp());

            let s = &mut sums[row];
            s.copy_from_slice(e);
            let sum = tree_reduce(s, |x, y| x + y);

            (0..size).for_each(|i| u[i * stride + b] = e[i] / sum);
        }
    }
}

impl Clone for Softmax {
    /// Clones are unlocked and own fresh scratch space.
    fn clone(&self) -> Self {
        Self::new()
    }
}

fn apply_host(units: &mut [f32], size: usize, conf: &BunchConfig) {
    let stride = conf.max_bunch_size;

    for b in 0..conf.cur_bunch_size {
        let max = (0..size)
            .map(|i| units[i * stride + b])
            .fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.;
        for i in 0..size {
            let e = (units[i * stride + b] - max).exp();
            units[i * stride + b] = e;
            sum += e;
        }

        (0..size).for_each(|i| units[i * stride + b] /= sum);
    }
}

/// Reduces a power of two long slice pairwise, returning the reduction at position 0.
fn tree_reduce<F>(values: &mut [f32], op: F) -> f32
where
    F: Fn(f32, f32) -> f32,
{
    let mut half = values.len() / 2;

    while half > 0 {
        for k in 0..half {
            values[k] = op(values[k], values[k + half]);
        }
        half /= 2;
    }

    values[0]
}
