//! Strided vector primitives over `MirroredBuffer`s.
//!
//! Each routine operates on the side selected by `use_device`, resolving coherence through the
//! buffer views. Offsets, strides and counts follow the usual BLAS level 1 conventions; indexing
//! out of the buffers is a programming error and panics.

use super::MirroredBuffer;

fn positions(n: usize, offset: usize, inc: usize) -> impl Iterator<Item = usize> {
    (0..n).map(move |k| offset + k * inc)
}

/// `y[y_off + k * y_inc] = x[x_off + k * x_inc]` for `k` in `0..n`.
#[allow(clippy::too_many_arguments)]
pub fn scopy(
    n: usize,
    x: &mut MirroredBuffer,
    x_off: usize,
    x_inc: usize,
    y: &mut MirroredBuffer,
    y_off: usize,
    y_inc: usize,
    use_device: bool,
) {
    let xs = x.view(use_device);
    let ys = y.view_mut(use_device);

    positions(n, x_off, x_inc)
        .zip(positions(n, y_off, y_inc))
        .for_each(|(i, j)| ys[j] = xs[i]);
}

/// `y[y_off + k * y_inc] += alpha * x[x_off + k * x_inc]` for `k` in `0..n`.
#[allow(clippy::too_many_arguments)]
pub fn saxpy(
    n: usize,
    alpha: f32,
    x: &mut MirroredBuffer,
    x_off: usize,
    x_inc: usize,
    y: &mut MirroredBuffer,
    y_off: usize,
    y_inc: usize,
    use_device: bool,
) {
    let xs = x.view(use_device);
    let ys = y.view_mut(use_device);

    positions(n, x_off, x_inc)
        .zip(positions(n, y_off, y_inc))
        .for_each(|(i, j)| ys[j] += alpha * xs[i]);
}

/// `x[off + k * inc] *= alpha` for `k` in `0..n`.
pub fn sscal(n: usize, alpha: f32, x: &mut MirroredBuffer, off: usize, inc: usize, use_device: bool) {
    let xs = x.view_mut(use_device);
    positions(n, off, inc).for_each(|i| xs[i] *= alpha);
}

/// Repeats `scopy` `times` times, advancing `x` by `x_step` and `y` by `y_step` each time.
#[allow(clippy::too_many_arguments)]
pub fn scopy_loop(
    n: usize,
    x: &mut MirroredBuffer,
    x_inc: usize,
    y: &mut MirroredBuffer,
    y_inc: usize,
    times: usize,
    x_step: usize,
    y_step: usize,
    use_device: bool,
) {
    for t in 0..times {
        scopy(n, x, t * x_step, x_inc, y, t * y_step, y_inc, use_device);
    }
}

/// Repeats `saxpy` `times` times, advancing `x` by `x_step` and `y` by `y_step` each time.
#[allow(clippy::too_many_arguments)]
pub fn saxpy_loop(
    n: usize,
    alpha: f32,
    x: &mut MirroredBuffer,
    x_inc: usize,
    y: &mut MirroredBuffer,
    y_inc: usize,
    times: usize,
    x_step: usize,
    y_step: usize,
    use_device: bool,
) {
    for t in 0..times {
        saxpy(n, alpha, x, t * x_step, x_inc, y, t * y_step, y_inc, use_device);
    }
}

/// `x[off + k * inc] = value` for `k` in `0..n`.
pub fn fill(n: usize, value: f32, x: &mut MirroredBuffer, off: usize, inc: usize, use_device: bool) {
    let xs = x.view_mut(use_device);
    positions(n, off, inc).for_each(|i| xs[i] = value);
}

/// Returns `Σ x[off + k * inc]` for `k` in `0..n`.
pub fn sum(n: usize, x: &mut MirroredBuffer, off: usize, inc: usize, use_device: bool) -> f32 {
    let xs = x.view(use_device);
    positions(n, off, inc).map(|i| xs[i]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strided_copy() {
        let mut x = MirroredBuffer::from_vec(vec![1., 2., 3., 4.]);
        let mut y = MirroredBuffer::new(4);
        scopy(2, &mut x, 1, 2, &mut y, 0, 1, false);
        assert_eq!(y.read(), &[2., 4., 0., 0.]);
    }

    #[test]
    fn test_saxpy_on_device_side() {
        let mut x = MirroredBuffer::from_vec(vec![1., 1., 1.]);
        let mut y = MirroredBuffer::from_vec(vec![1., 2., 3.]);
        saxpy(3, 2., &mut x, 0, 1, &mut y, 0, 1, true);
        assert_eq!(y.read(), &[3., 4., 5.]);
    }

    #[test]
    fn test_saxpy_loop_broadcasts_a_vector() {
        // Two units, a bunch of three patterns.
        let mut bias = MirroredBuffer::from_vec(vec![1., 2.]);
        let mut out = MirroredBuffer::new(6);
        saxpy_loop(2, 1., &mut bias, 1, &mut out, 3, 3, 0, 1, false);
        assert_eq!(out.read(), &[1., 1., 1., 2., 2., 2.]);
    }

    #[test]
    fn test_fill_and_sum() {
        let mut x = MirroredBuffer::new(4);
        fill(2, 3., &mut x, 1, 2, false);
        assert_eq!(x.read(), &[0., 3., 0., 3.]);
        assert_eq!(sum(4, &mut x, 0, 1, false), 6.);
    }
}
