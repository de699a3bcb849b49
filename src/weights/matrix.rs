use std::mem;

use log::{debug, warn};
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{AnnErr, Result, buffer::MirroredBuffer, buffer::blas};

/// Default half width of the band around zero that randomized weights never fall in.
pub const WEIGHT_NEAR_ZERO: f64 = 1e-7;

/// A weight matrix that may be shared by several components.
///
/// The matrix holds the live `weights` and a `staging` buffer. During an update cycle every
/// referencing component calls `begin_update`, adds its gradient contribution into `staging` and
/// calls `end_update`; only the last of them swaps both buffers, so no component ever trains
/// against partially updated weights.
///
/// Weight `w[i * num_outputs + j]` connects input `i` with output `j`.
#[derive(Debug)]
pub struct WeightMatrix {
    num_inputs: usize,
    num_outputs: usize,
    weights: MirroredBuffer,
    staging: MirroredBuffer,
    num_references: usize,
    pending_updates: usize,
    near_zero: f64,
}

impl WeightMatrix {
    /// Creates a new zeroed `WeightMatrix`.
    ///
    /// # Arguments
    /// * `num_inputs` - The amount of inputs.
    /// * `num_outputs` - The amount of outputs.
    ///
    /// # Returns
    /// A new matrix with no references or an error if any of the sizes is zero.
    pub fn new(num_inputs: usize, num_outputs: usize) -> Result<Self> {
        if num_inputs == 0 || num_outputs == 0 {
            return Err(AnnErr::ZeroSize {
                what: "weight matrix",
            });
        }

        let total_size = num_inputs * num_outputs;

        Ok(Self {
            num_inputs,
            num_outputs,
            weights: MirroredBuffer::new(total_size),
            staging: MirroredBuffer::new(total_size),
            num_references: 0,
            pending_updates: 0,
            near_zero: WEIGHT_NEAR_ZERO,
        })
    }

    /// Changes the near zero exclusion band used by the randomization methods.
    pub fn with_near_zero(mut self, near_zero: f64) -> Self {
        self.near_zero = near_zero;
        self
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Returns the amount of weights in the matrix.
    pub fn size(&self) -> usize {
        self.num_inputs * self.num_outputs
    }

    pub fn near_zero(&self) -> f64 {
        self.near_zero
    }

    pub fn num_references(&self) -> usize {
        self.num_references
    }

    pub fn pending_updates(&self) -> usize {
        self.pending_updates
    }

    /// Validates that this matrix has the given shape.
    pub fn check_sizes(&self, num_inputs: usize, num_outputs: usize) -> Result<()> {
        if self.num_inputs != num_inputs {
            return Err(AnnErr::SizeMismatch {
                a: "weight matrix inputs",
                b: "component inputs",
                got: self.num_inputs,
                expected: num_inputs,
            });
        }

        if self.num_outputs != num_outputs {
            return Err(AnnErr::SizeMismatch {
                a: "weight matrix outputs",
                b: "component outputs",
                got: self.num_outputs,
                expected: num_outputs,
            });
        }

        Ok(())
    }

    /// Registers one more component that will update this matrix on every training step.
    pub fn count_reference(&mut self) {
        self.num_references += 1;
    }

    /// Starts the contribution of one referencing component to the current update cycle.
    ///
    /// The first call of a cycle seeds `staging` as the basis of the accumulated update: with
    /// momentum it becomes `-momentum * (staging - weights) + (1 - weight_decay) * weights`,
    /// otherwise it is a copy of `weights` (scaled by `1 - weight_decay`).
    ///
    /// # Arguments
    /// * `momentum` - The momentum of the calling component.
    /// * `weight_decay` - The weight decay of the calling component.
    /// * `use_device` - Whether to operate on the device side of the buffers.
    ///
    /// # Returns
    /// An error if every reference already contributed to this cycle.
    pub fn begin_update(&mut self, momentum: f32, weight_decay: f32, use_device: bool) -> Result<()> {
        if self.pending_updates >= self.num_references {
            return Err(AnnErr::SizeMismatch {
                a: "update calls",
                b: "references",
                got: self.pending_updates + 1,
                expected: self.num_references,
            });
        }

        self.pending_updates += 1;

        if self.is_first_update_call() {
            self.seed_staging(momentum, weight_decay, use_device);
        }

        Ok(())
    }

    /// Finishes the contribution of one referencing component.
    ///
    /// # Returns
    /// Whether this was the last contribution of the cycle, in which case the accumulated
    /// `staging` buffer became the live weights.
    pub fn end_update(&mut self) -> bool {
        if self.pending_updates != self.num_references {
            return false;
        }

        mem::swap(&mut self.weights, &mut self.staging);
        self.pending_updates = 0;
        debug!(
            inputs = self.num_inputs, outputs = self.num_outputs;
            "weights swapped after {} contributions", self.num_references
        );
        true
    }

    /// Returns whether the ongoing update cycle has received exactly one contribution.
    pub fn is_first_update_call(&self) -> bool {
        self.pending_updates == 1
    }

    /// Returns the scale applied to a gradient before accumulating it into `staging`.
    ///
    /// The `1 / sqrt(references * bunch_size)` factor keeps the gradient magnitude independent
    /// from the fan out of the matrix and the bunch size.
    pub fn update_scale(&self, learning_rate: f32, bunch_size: usize) -> f32 {
        let norm = ((self.num_references.max(1) * bunch_size.max(1)) as f32).sqrt();
        -learning_rate / norm
    }

    pub fn weights_mut(&mut self) -> &mut MirroredBuffer {
        &mut self.weights
    }

    pub fn staging_mut(&mut self) -> &mut MirroredBuffer {
        &mut self.staging
    }

    /// Gives both buffers at once, live weights first.
    pub fn buffers_mut(&mut self) -> (&mut MirroredBuffer, &mut MirroredBuffer) {
        (&mut self.weights, &mut self.staging)
    }

    /// Fills the matrix with uniform values in `[low, high]` outside the near zero band.
    ///
    /// # Returns
    /// An error if any of the bounds lies inside the band or the range is empty.
    pub fn randomize_weights<R: Rng + ?Sized>(&mut self, rng: &mut R, low: f32, high: f32) -> Result<()> {
        let dist = self.distribution(low, high)?;
        let near_zero = self.near_zero;
        let outputs = self.num_outputs;
        let w = self.weights.write();

        for j in 0..outputs {
            for i in 0..self.num_inputs {
                w[i * outputs + j] = sample_outside_band(&dist, rng, near_zero);
            }
        }

        let w = w.to_vec();
        self.staging.write().copy_from_slice(&w);
        Ok(())
    }

    /// Like `randomize_weights` but only for the weights reaching output `col`.
    pub fn randomize_weights_at_column<R: Rng + ?Sized>(
        &mut self,
        col: usize,
        rng: &mut R,
        low: f32,
        high: f32,
    ) -> Result<()> {
        if col >= self.num_outputs {
            return Err(AnnErr::SizeMismatch {
                a: "column",
                b: "weight matrix outputs",
                got: col,
                expected: self.num_outputs,
            });
        }

        let dist = self.distribution(low, high)?;
        let near_zero = self.near_zero;
        let outputs = self.num_outputs;
        let w = self.weights.read_write();
        let s = self.staging.read_write();

        for i in 0..self.num_inputs {
            let k = i * outputs + col;
            w[k] = sample_outside_band(&dist, rng, near_zero);
            s[k] = w[k];
        }

        Ok(())
    }

    /// Loads the weights from a row major dense matrix.
    ///
    /// Output `j` is read from the row starting at `first_pos + j * column_size`, whose first
    /// `num_inputs` values are its incoming weights.
    ///
    /// # Arguments
    /// * `matrix` - The source of the live weights.
    /// * `old_matrix` - The source of the staging weights, `matrix` if not given.
    /// * `first_pos` - The flat position of the first weight.
    /// * `column_size` - The distance between two consecutive rows.
    ///
    /// # Returns
    /// The flat position following the last row or an error if the matrices are too small or
    /// not in standard layout.
    pub fn load_weights(
        &mut self,
        matrix: &Array2<f32>,
        old_matrix: Option<&Array2<f32>>,
        first_pos: usize,
        column_size: usize,
    ) -> Result<usize> {
        let old_matrix = old_matrix.unwrap_or(matrix);
        self.check_dense(matrix.len(), first_pos, column_size)?;
        self.check_dense(old_matrix.len(), first_pos, column_size)?;

        let (Some(data), Some(old_data)) = (matrix.as_slice(), old_matrix.as_slice()) else {
            return Err(AnnErr::NonSimpleMatrix);
        };

        let outputs = self.num_outputs;
        let w = self.weights.write();
        let s = self.staging.write();
        let mut pos = first_pos;

        for j in 0..outputs {
            for i in 0..self.num_inputs {
                w[i * outputs + j] = data[pos + i];
                s[i * outputs + j] = old_data[pos + i];
            }
            pos += column_size;
        }

        Ok(pos)
    }

    /// Stores the weights into a row major dense matrix, the inverse of `load_weights`.
    ///
    /// The staging weights are only written when `old_matrix` is given.
    pub fn copy_weights_to(
        &mut self,
        matrix: &mut Array2<f32>,
        mut old_matrix: Option<&mut Array2<f32>>,
        first_pos: usize,
        column_size: usize,
    ) -> Result<usize> {
        self.check_dense(matrix.len(), first_pos, column_size)?;
        if let Some(old) = old_matrix.as_deref() {
            self.check_dense(old.len(), first_pos, column_size)?;
        }

        let data = matrix.as_slice_mut().ok_or(AnnErr::NonSimpleMatrix)?;
        let mut old_data = match old_matrix.as_deref_mut() {
            Some(old) => Some(old.as_slice_mut().ok_or(AnnErr::NonSimpleMatrix)?),
            None => None,
        };

        let outputs = self.num_outputs;
        let w = self.weights.read();
        let mut pos = first_pos;

        for j in 0..outputs {
            for i in 0..self.num_inputs {
                data[pos + i] = w[i * outputs + j];
            }
            pos += column_size;
        }

        if let Some(old_data) = old_data.as_deref_mut() {
            let s = self.staging.read();
            let mut pos = first_pos;

            for j in 0..outputs {
                for i in 0..self.num_inputs {
                    old_data[pos + i] = s[i * outputs + j];
                }
                pos += column_size;
            }
        }

        Ok(pos)
    }

    /// Multiplies both buffers by `alpha`.
    pub fn scale(&mut self, alpha: f32) {
        let n = self.size();
        blas::sscal(n, alpha, &mut self.weights, 0, 1, false);
        blas::sscal(n, alpha, &mut self.staging, 0, 1, false);
    }

    /// Flushes subnormal weights to zero and checks every weight is finite.
    ///
    /// # Returns
    /// A `NonFiniteWeights` error with the position of the first non finite weight.
    pub fn prune_subnormal_and_check_normal(&mut self) -> Result<()> {
        let mut pruned = 0;

        for (position, w) in self.weights.read_write().iter_mut().enumerate() {
            if !w.is_finite() {
                return Err(AnnErr::NonFiniteWeights { position });
            }

            if w.is_subnormal() {
                *w = 0.;
                pruned += 1;
            }
        }

        if pruned > 0 {
            warn!("flushed {pruned} subnormal weights to zero");
        }

        Ok(())
    }

    /// Logs the state and contents of the matrix.
    pub fn debug_dump(&mut self) {
        debug!(
            "weight matrix inputs={} outputs={} references={} pending={}",
            self.num_inputs, self.num_outputs, self.num_references, self.pending_updates
        );
        debug!("weights: {:?}", self.weights.read());
        debug!("staging: {:?}", self.staging.read());
    }

    fn seed_staging(&mut self, momentum: f32, weight_decay: f32, use_device: bool) {
        let n = self.size();
        let keep = 1. - weight_decay;

        if momentum > 0. {
            // staging = -momentum * (staging - weights) + keep * weights
            blas::saxpy(n, -1., &mut self.weights, 0, 1, &mut self.staging, 0, 1, use_device);
            blas::sscal(n, -momentum, &mut self.staging, 0, 1, use_device);
            blas::saxpy(n, keep, &mut self.weights, 0, 1, &mut self.staging, 0, 1, use_device);
        } else {
            blas::scopy(n, &mut self.weights, 0, 1, &mut self.staging, 0, 1, use_device);
            if weight_decay != 0. {
                blas::sscal(n, keep, &mut self.staging, 0, 1, use_device);
            }
        }
    }

    fn distribution(&self, low: f32, high: f32) -> Result<Uniform<f64>> {
        let invalid = AnnErr::InvalidRange {
            low,
            high,
            near_zero: self.near_zero,
        };

        if (low as f64).abs() <= self.near_zero || (high as f64).abs() <= self.near_zero {
            return Err(invalid);
        }

        Uniform::new_inclusive(low as f64, high as f64).map_err(|_| invalid)
    }

    fn check_dense(&self, len: usize, first_pos: usize, column_size: usize) -> Result<()> {
        if column_size < self.num_inputs {
            return Err(AnnErr::SizeMismatch {
                a: "column size",
                b: "weight matrix inputs",
                got: column_size,
                expected: self.num_inputs,
            });
        }

        let min_size = first_pos + (self.num_outputs - 1) * column_size + self.num_inputs;
        if min_size > len {
            return Err(AnnErr::MatrixTooSmall {
                got: len,
                expected: min_size,
            });
        }

        Ok(())
    }
}

impl Clone for WeightMatrix {
    /// Deep copies both buffers, the clone starts with no references.
    fn clone(&self) -> Self {
        Self {
            num_inputs: self.num_inputs,
            num_outputs: self.num_outputs,
            weights: self.weights.clone(),
            staging: self.staging.clone(),
            num_references: 0,
            pending_updates: 0,
            near_zero: self.near_zero,
        }
    }
}

fn sample_outside_band<R: Rng + ?Sized>(dist: &Uniform<f64>, rng: &mut R, near_zero: f64) -> f32 {
    loop {
        let w = dist.sample(rng) as f32;
        if (w as f64).abs() > near_zero {
            return w;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn referenced(inputs: usize, outputs: usize, refs: usize) -> WeightMatrix {
        let mut m = WeightMatrix::new(inputs, outputs).unwrap();
        (0..refs).for_each(|_| m.count_reference());
        m
    }

    fn set(buf: &mut MirroredBuffer, values: &[f32]) {
        buf.write().copy_from_slice(values);
    }

    #[test]
    fn test_zero_sized_matrix() {
        assert_eq!(
            WeightMatrix::new(0, 3).unwrap_err(),
            AnnErr::ZeroSize {
                what: "weight matrix"
            }
        );
    }

    #[test]
    fn test_swap_only_after_every_reference() {
        const REFS: usize = 3;
        let mut m = referenced(1, 2, REFS);

        for call in 1..=REFS {
            m.begin_update(0., 0., false).unwrap();
            m.staging_mut().read_write()[0] += 1.;
            assert_eq!(m.end_update(), call == REFS, "call {call}");
        }

        assert_eq!(m.pending_updates(), 0);
        assert_eq!(m.weights_mut().read(), &[3., 0.]);
    }

    #[test]
    fn test_begin_update_beyond_references() {
        let mut m = referenced(1, 1, 1);
        m.begin_update(0., 0., false).unwrap();
        assert!(m.begin_update(0., 0., false).is_err());
    }

    #[test]
    fn test_momentum_seeding() {
        let mut m = referenced(1, 2, 1);
        set(m.weights_mut(), &[1., 2.]);
        set(m.staging_mut(), &[0., 1.]);

        m.begin_update(0.5, 0., false).unwrap();
        // -0.5 * (staging - weights) + weights
        assert_eq!(m.staging_mut().read(), &[1.5, 2.5]);
        assert!(m.end_update());
        assert_eq!(m.weights_mut().read(), &[1.5, 2.5]);
    }

    #[test]
    fn test_momentum_seeded_once_per_cycle() {
        let mut m = referenced(1, 1, 2);
        set(m.weights_mut(), &[1.]);
        set(m.staging_mut(), &[0.]);

        m.begin_update(0.5, 0., false).unwrap();
        let seeded = m.staging_mut().read()[0];
        m.begin_update(0.5, 0., false).unwrap();
        assert_eq!(m.staging_mut().read()[0], seeded);
    }

    #[test]
    fn test_weight_decay_without_momentum() {
        let mut m = referenced(1, 2, 1);
        set(m.weights_mut(), &[1., -2.]);

        m.begin_update(0., 0.5, false).unwrap();
        assert_eq!(m.staging_mut().read(), &[0.5, -1.]);
    }

    #[test]
    fn test_update_scale() {
        let m = referenced(1, 1, 4);
        assert_eq!(m.update_scale(0.2, 4), -0.05);
    }

    #[test]
    fn test_randomize_avoids_near_zero_band() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut m = WeightMatrix::new(20, 20).unwrap().with_near_zero(0.05);

        for _ in 0..10 {
            m.randomize_weights(&mut rng, -0.1, 0.1).unwrap();
            let w = m.weights_mut().read().to_vec();
            assert!(w.iter().all(|x| x.abs() > 0.05 && x.abs() <= 0.1));
            assert_eq!(m.staging_mut().read(), w.as_slice());
        }
    }

    #[test]
    fn test_randomize_rejects_bounds_inside_band() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut m = WeightMatrix::new(2, 2).unwrap();
        assert!(matches!(
            m.randomize_weights(&mut rng, 0., 1.),
            Err(AnnErr::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_randomize_single_column() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut m = WeightMatrix::new(3, 2).unwrap();
        m.randomize_weights_at_column(1, &mut rng, -1., 1.).unwrap();

        let w = m.weights_mut().read();
        assert_eq!([w[0], w[2], w[4]], [0.; 3]);
        assert!([w[1], w[3], w[5]].iter().all(|x| *x != 0.));
    }

    #[test]
    fn test_dense_round_trip() {
        // Two outputs, three inputs, a leading value and one spare slot per row.
        let data: Vec<f32> = (0..10).map(|x| x as f32 * 0.25 - 1.).collect();
        let matrix = Array2::from_shape_vec((2, 5), data).unwrap();

        let mut m = WeightMatrix::new(3, 2).unwrap();
        let next = m.load_weights(&matrix, None, 1, 4).unwrap();
        assert_eq!(next, 9);

        let mut out = Array2::zeros((2, 5));
        let mut old = Array2::zeros((2, 5));
        m.copy_weights_to(&mut out, Some(&mut old), 1, 4).unwrap();

        for k in 1..8 {
            if k == 4 {
                continue;
            }
            assert_eq!(out.as_slice().unwrap()[k], matrix.as_slice().unwrap()[k]);
        }
        assert_eq!(out, old);
    }

    #[test]
    fn test_dense_too_small() {
        let matrix = Array2::zeros((2, 3));
        let mut m = WeightMatrix::new(3, 2).unwrap();
        assert_eq!(
            m.load_weights(&matrix, None, 1, 3).unwrap_err(),
            AnnErr::MatrixTooSmall {
                got: 6,
                expected: 7
            }
        );
    }

    #[test]
    fn test_dense_non_simple() {
        let matrix = Array2::<f32>::zeros((4, 4)).reversed_axes();
        let mut m = WeightMatrix::new(2, 2).unwrap();
        assert_eq!(
            m.load_weights(&matrix, None, 0, 2).unwrap_err(),
            AnnErr::NonSimpleMatrix
        );
    }

    #[test]
    fn test_clone_resets_references() {
        let mut m = referenced(2, 2, 2);
        set(m.weights_mut(), &[1., 2., 3., 4.]);

        let mut c = m.clone();
        assert_eq!(c.num_references(), 0);
        assert_eq!(c.weights_mut().read(), &[1., 2., 3., 4.]);
    }

    #[test]
    fn test_scale_both_buffers() {
        let mut m = referenced(1, 2, 1);
        set(m.weights_mut(), &[1., 2.]);
        set(m.staging_mut(), &[3., 4.]);
        m.scale(2.);

        assert_eq!(m.weights_mut().read(), &[2., 4.]);
        assert_eq!(m.staging_mut().read(), &[6., 8.]);
    }

    #[test]
    fn test_prune_and_check() {
        let mut m = referenced(1, 3, 1);
        set(m.weights_mut(), &[1., f32::MIN_POSITIVE / 2., 3.]);
        m.prune_subnormal_and_check_normal().unwrap();
        assert_eq!(m.weights_mut().read(), &[1., 0., 3.]);

        set(m.weights_mut(), &[1., f32::NAN, 3.]);
        assert_eq!(
            m.prune_subnormal_and_check_normal().unwrap_err(),
            AnnErr::NonFiniteWeights { position: 1 }
        );
    }
}
