use std::rc::Rc;

use ndarray::{ArrayView2, ArrayViewMut2, linalg};

use super::{
    ComponentDict, Hyperparams, bind_weights, bunch_size_of, check_used, empty_token,
    export_weights, matrix_of, missing_token, options::unknown_option, zero_token,
};
use crate::{
    AnnErr, Result,
    token::TokenRef,
    weights::{WeightId, WeightRegistry},
};

/// A fully connected component, every input is connected with every output.
///
/// With the bunch laid out as an `inputs x bunch` matrix `X` and the weights as an
/// `inputs x outputs` matrix `W`, the forward pass computes `Y = Wᵀ X` and the backward pass
/// propagates `W E`.
#[derive(Debug)]
pub struct DenseComponent {
    name: String,
    weights_name: String,
    input_size: usize,
    output_size: usize,
    bunch_size: usize,
    params: Hyperparams,
    use_device: bool,
    weights: Option<WeightId>,
    input: Option<TokenRef>,
    error: Option<TokenRef>,
    output: TokenRef,
    error_output: TokenRef,
}

impl DenseComponent {
    /// Creates a new unbuilt `DenseComponent`.
    ///
    /// # Arguments
    /// * `name` - The name of the component.
    /// * `weights_name` - The name of the weight matrix in the registry.
    /// * `output_size` - The amount of outputs, the inputs are given when building.
    pub fn new(name: &str, weights_name: &str, output_size: usize) -> Self {
        Self {
            name: name.to_string(),
            weights_name: weights_name.to_string(),
            input_size: 0,
            output_size,
            bunch_size: 0,
            params: Hyperparams::default(),
            use_device: false,
            weights: None,
            input: None,
            error: None,
            output: empty_token(),
            error_output: empty_token(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weights_name(&self) -> &str {
        &self.weights_name
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn bunch_size(&self) -> usize {
        self.bunch_size
    }

    pub fn weights_id(&self) -> Option<WeightId> {
        self.weights
    }

    /// Binds the component to an `input_size x output_size` weight matrix.
    ///
    /// # Returns
    /// An error if a size is zero, `output_size` isn't the declared one or the registered
    /// matrix has another shape.
    pub fn build(
        &mut self,
        input_size: usize,
        output_size: usize,
        weights: &mut WeightRegistry,
        components: &mut ComponentDict,
    ) -> Result<()> {
        if input_size == 0 || output_size == 0 {
            return Err(AnnErr::ZeroSize {
                what: "dense component",
            });
        }

        if self.output_size != 0 && self.output_size != output_size {
            return Err(AnnErr::SizeMismatch {
                a: "dense outputs",
                b: "declared outputs",
                got: output_size,
                expected: self.output_size,
            });
        }

        components.register(&self.name, input_size, output_size)?;
        self.weights = Some(bind_weights(
            weights,
            &self.weights_name,
            input_size,
            output_size,
        )?);
        self.input_size = input_size;
        self.output_size = output_size;
        Ok(())
    }

    /// Computes `Y = Wᵀ X` for the whole bunch.
    pub fn forward(&mut self, weights: &mut WeightRegistry, input: TokenRef) -> Result<TokenRef> {
        let matrix = matrix_of(weights, self.weights, &self.name)?;
        let (inputs, outputs) = (self.input_size, self.output_size);
        let use_device = self.use_device;

        let bunch_size = {
            let mut token = input.borrow_mut();
            let x = token.as_block_mut("input")?;
            let n = bunch_size_of(x.used_size(), inputs, "input")?;
            let x = view(x.buffer_mut().view(use_device), (inputs, n), "input")?;
            let w = view(matrix.weights_mut().view(use_device), (inputs, outputs), "weights")?;

            let mut output = self.output.borrow_mut();
            let y = output.as_block_mut("output")?;
            y.resize(outputs * n);
            let mut y = view_mut(y.buffer_mut().view_mut(use_device), (outputs, n), "output")?;

            linalg::general_mat_mul(1., &w.t(), &x, 0., &mut y);
            n
        };

        self.bunch_size = bunch_size;
        self.input = Some(input);
        Ok(Rc::clone(&self.output))
    }

    /// Records the error and propagates `W E` against the live weights.
    pub fn backward(&mut self, weights: &mut WeightRegistry, error: TokenRef) -> Result<TokenRef> {
        let matrix = matrix_of(weights, self.weights, &self.name)?;
        let (inputs, outputs, n) = (self.input_size, self.output_size, self.bunch_size);
        let use_device = self.use_device;

        {
            let mut token = error.borrow_mut();
            let e = token.as_block_mut("error")?;
            check_used(e.used_size(), outputs * n, "error")?;
            let e = view(e.buffer_mut().view(use_device), (outputs, n), "error")?;
            let w = view(matrix.weights_mut().view(use_device), (inputs, outputs), "weights")?;

            let mut error_output = self.error_output.borrow_mut();
            let d = error_output.as_block_mut("error output")?;
            d.resize(inputs * n);
            let mut d = view_mut(d.buffer_mut().view_mut(use_device), (inputs, n), "error output")?;

            linalg::general_mat_mul(1., &w, &e, 0., &mut d);
        }

        self.error = Some(error);
        Ok(Rc::clone(&self.error_output))
    }

    /// Accumulates `-lr / sqrt(references * bunch) * X Eᵀ` into the staged weights.
    pub fn update(&mut self, weights: &mut WeightRegistry) -> Result<()> {
        let learning_rate = self.params.learning_rate(&self.name)?;
        let (inputs, outputs, n) = (self.input_size, self.output_size, self.bunch_size);
        let use_device = self.use_device;

        let input = self
            .input
            .as_ref()
            .ok_or_else(|| missing_token(&self.name, "input"))?;
        let error = self
            .error
            .as_ref()
            .ok_or_else(|| missing_token(&self.name, "error"))?;

        let mut x_token = input.borrow_mut();
        let x = x_token.as_block_mut("input")?;
        check_used(x.used_size(), inputs * n, "input")?;
        let mut e_token = error.borrow_mut();
        let e = e_token.as_block_mut("error")?;
        check_used(e.used_size(), outputs * n, "error")?;

        let matrix = matrix_of(weights, self.weights, &self.name)?;
        matrix.begin_update(self.params.momentum, self.params.weight_decay, use_device)?;
        let scale = matrix.update_scale(learning_rate, n);

        let x = view(x.buffer_mut().view(use_device), (inputs, n), "input")?;
        let e = view(e.buffer_mut().view(use_device), (outputs, n), "error")?;
        let mut s = view_mut(
            matrix.staging_mut().view_mut(use_device),
            (inputs, outputs),
            "staging",
        )?;
        linalg::general_mat_mul(scale, &x, &e.t(), 1., &mut s);

        matrix.end_update();
        Ok(())
    }

    /// Zeroes both outputs and releases the input and error tokens.
    pub fn reset(&mut self) -> Result<()> {
        zero_token(&self.output, self.use_device)?;
        zero_token(&self.error_output, self.use_device)?;
        self.input = None;
        self.error = None;
        Ok(())
    }

    pub fn copy_weights(&self, from: &WeightRegistry, into: &mut WeightRegistry) -> Result<()> {
        export_weights(&self.name, &self.weights_name, self.weights, from, into)
    }

    pub fn has_option(&self, option: &str) -> bool {
        option == "use_device" || Hyperparams::has(option)
    }

    pub fn set_option(&mut self, option: &str, value: f64) -> Result<()> {
        match option {
            "use_device" => self.use_device = value != 0.,
            _ => self.params.set(&self.name, option, value)?,
        }

        Ok(())
    }

    pub fn get_option(&self, option: &str) -> Result<f64> {
        match option {
            "use_device" => Ok(if self.use_device { 1. } else { 0. }),
            _ if Hyperparams::has(option) => self.params.get(&self.name, option),
            _ => Err(unknown_option(&self.name, option)),
        }
    }
}

impl Clone for DenseComponent {
    /// Clones the configuration, the clone is unbuilt.
    fn clone(&self) -> Self {
        let mut component = Self::new(&self.name, &self.weights_name, self.output_size);
        component.params = self.params;
        component.use_device = self.use_device;
        component
    }
}

/// Views the head of a flat buffer as a row major matrix.
fn view<'a>(data: &'a [f32], shape: (usize, usize), what: &'static str) -> Result<ArrayView2<'a, f32>> {
    let expected = shape.0 * shape.1;
    let got = data.len();

    data.get(..expected)
        .and_then(|data| ArrayView2::from_shape(shape, data).ok())
        .ok_or(AnnErr::SizeMismatch {
            a: what,
            b: "matrix shape",
            got,
            expected,
        })
}

/// Mutable version of `view`.
fn view_mut<'a>(
    data: &'a mut [f32],
    shape: (usize, usize),
    what: &'static str,
) -> Result<ArrayViewMut2<'a, f32>> {
    let expected = shape.0 * shape.1;
    let got = data.len();

    data.get_mut(..expected)
        .and_then(|data| ArrayViewMut2::from_shape(shape, data).ok())
        .ok_or(AnnErr::SizeMismatch {
            a: what,
            b: "matrix shape",
            got,
            expected,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenBlock;

    const EPS: f32 = 1e-6;

    /// A 2 -> 3 dense component whose weight `w[i][j]` is `i + 1 + j / 10`.
    fn dense(weights: &mut WeightRegistry) -> DenseComponent {
        let mut dense = DenseComponent::new("d1", "w", 3);
        dense
            .build(2, 3, weights, &mut ComponentDict::new())
            .unwrap();
        dense.set_option("learning_rate", 0.5).unwrap();

        weights
            .by_name_mut("w")
            .unwrap()
            .weights_mut()
            .write()
            .copy_from_slice(&[1., 1.1, 1.2, 2., 2.1, 2.2]);
        dense
    }

    fn values(token: &TokenRef) -> Vec<f32> {
        token
            .borrow_mut()
            .as_block_mut("test")
            .unwrap()
            .read()
            .to_vec()
    }

    fn assert_close(got: &[f32], expected: &[f32]) {
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < EPS, "got {got:?}, expected {expected:?}");
        }
    }

    #[test]
    fn test_forward() {
        let mut weights = WeightRegistry::new();
        let mut dense = dense(&mut weights);

        // Two patterns: [1, 0] and [1, 2].
        let input = TokenBlock::from_vec(vec![1., 1., 0., 2.]).into_ref();
        let out = dense.forward(&mut weights, input).unwrap();

        // y_j = Σ_i w[i][j] x_i, laid out as output j of pattern b at j * 2 + b.
        assert_close(&values(&out), &[1., 5., 1.1, 5.3, 1.2, 5.6]);
        assert_eq!(dense.bunch_size(), 2);
    }

    #[test]
    fn test_backward_propagates_through_weights() {
        let mut weights = WeightRegistry::new();
        let mut dense = dense(&mut weights);

        dense
            .forward(&mut weights, TokenBlock::from_vec(vec![1., 2.]).into_ref())
            .unwrap();
        let error = TokenBlock::from_vec(vec![1., 0., -1.]).into_ref();
        let back = dense.backward(&mut weights, error).unwrap();

        // e_i = Σ_j w[i][j] e_j
        assert_close(&values(&back), &[1. - 1.2, 2. - 2.2]);
    }

    #[test]
    fn test_update() {
        let mut weights = WeightRegistry::new();
        let mut dense = dense(&mut weights);

        dense
            .forward(&mut weights, TokenBlock::from_vec(vec![1., 2.]).into_ref())
            .unwrap();
        dense
            .backward(&mut weights, TokenBlock::from_vec(vec![1., 0., -1.]).into_ref())
            .unwrap();
        dense.update(&mut weights).unwrap();

        // w[i][j] -= 0.5 * x_i * e_j
        let w = weights.by_name_mut("w").unwrap().weights_mut().read().to_vec();
        assert_close(&w, &[0.5, 1.1, 1.7, 1., 2.1, 3.2]);
    }

    #[test]
    fn test_update_requires_a_backward_pass() {
        let mut weights = WeightRegistry::new();
        let mut dense = dense(&mut weights);

        dense
            .forward(&mut weights, TokenBlock::from_vec(vec![1., 2.]).into_ref())
            .unwrap();
        assert_eq!(
            dense.update(&mut weights),
            Err(AnnErr::MissingToken {
                component: "d1".to_string(),
                what: "error"
            })
        );
    }

    #[test]
    fn test_declared_outputs() {
        let mut weights = WeightRegistry::new();
        let mut dense = DenseComponent::new("d1", "w", 3);
        assert!(matches!(
            dense.build(2, 4, &mut weights, &mut ComponentDict::new()),
            Err(AnnErr::SizeMismatch { .. })
        ));
        assert!(weights.is_empty());
    }

    #[test]
    fn test_wrong_error_size() {
        let mut weights = WeightRegistry::new();
        let mut dense = dense(&mut weights);

        dense
            .forward(&mut weights, TokenBlock::from_vec(vec![1., 2.]).into_ref())
            .unwrap();
        assert!(matches!(
            dense.backward(&mut weights, TokenBlock::new(2).into_ref()),
            Err(AnnErr::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_device_matches_host() {
        let mut host_weights = WeightRegistry::new();
        let mut host = dense(&mut host_weights);
        let mut device_weights = WeightRegistry::new();
        let mut device = dense(&mut device_weights);
        device.set_option("use_device", 1.).unwrap();

        let input = vec![0.5, -1., 2., 3.];
        let host_out = host
            .forward(&mut host_weights, TokenBlock::from_vec(input.clone()).into_ref())
            .unwrap();
        let device_out = device
            .forward(&mut device_weights, TokenBlock::from_vec(input).into_ref())
            .unwrap();

        assert_close(&values(&device_out), &values(&host_out));
    }
}
