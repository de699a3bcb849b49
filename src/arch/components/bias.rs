use std::rc::Rc;

use super::{
    ComponentDict, Hyperparams, bind_weights, bunch_size_of, check_used, empty_token,
    export_weights, matrix_of, missing_token, not_built, options::unknown_option, zero_token,
};
use crate::{
    AnnErr, Result,
    buffer::blas,
    token::TokenRef,
    weights::{WeightId, WeightRegistry},
};

/// Adds a trainable bias vector to every pattern of the bunch.
///
/// The bias is a `1 x size` weight matrix, so it can be tied with other bias components by
/// giving them the same weights name.
#[derive(Debug)]
pub struct BiasComponent {
    name: String,
    weights_name: String,
    size: usize,
    bunch_size: usize,
    params: Hyperparams,
    use_device: bool,
    weights: Option<WeightId>,
    input: Option<TokenRef>,
    error: Option<TokenRef>,
    output: TokenRef,
}

impl BiasComponent {
    /// Creates a new unbuilt `BiasComponent`.
    ///
    /// # Arguments
    /// * `name` - The name of the component.
    /// * `weights_name` - The name of the bias vector in the weight registry.
    pub fn new(name: &str, weights_name: &str) -> Self {
        Self {
            name: name.to_string(),
            weights_name: weights_name.to_string(),
            size: 0,
            bunch_size: 0,
            params: Hyperparams::default(),
            use_device: false,
            weights: None,
            input: None,
            error: None,
            output: empty_token(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weights_name(&self) -> &str {
        &self.weights_name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bunch_size(&self) -> usize {
        self.bunch_size
    }

    pub fn weights_id(&self) -> Option<WeightId> {
        self.weights
    }

    /// Binds the component to its bias vector, creating it if `weights` has none.
    ///
    /// # Returns
    /// An error if the sizes are zero or differ, or the registered bias has another shape.
    pub fn build(
        &mut self,
        input_size: usize,
        output_size: usize,
        weights: &mut WeightRegistry,
        components: &mut ComponentDict,
    ) -> Result<()> {
        if input_size == 0 || output_size == 0 {
            return Err(AnnErr::ZeroSize {
                what: "bias component",
            });
        }

        if input_size != output_size {
            return Err(AnnErr::SizeMismatch {
                a: "bias inputs",
                b: "bias outputs",
                got: input_size,
                expected: output_size,
            });
        }

        components.register(&self.name, input_size, output_size)?;
        self.weights = Some(bind_weights(weights, &self.weights_name, 1, output_size)?);
        self.size = output_size;
        Ok(())
    }

    /// Copies the input into the output and adds the bias to every pattern.
    pub fn forward(&mut self, weights: &mut WeightRegistry, input: TokenRef) -> Result<TokenRef> {
        let matrix = matrix_of(weights, self.weights, &self.name)?;
        let use_device = self.use_device;

        let bunch_size = {
            let mut token = input.borrow_mut();
            let x = token.as_block_mut("input")?;
            let bunch_size = bunch_size_of(x.used_size(), self.size, "input")?;
            let n = bunch_size * self.size;

            let mut output = self.output.borrow_mut();
            let y = output.as_block_mut("output")?;
            y.resize(n);

            blas::scopy(n, x.buffer_mut(), 0, 1, y.buffer_mut(), 0, 1, use_device);
            blas::saxpy_loop(
                self.size,
                1.,
                matrix.weights_mut(),
                1,
                y.buffer_mut(),
                bunch_size,
                bunch_size,
                0,
                1,
                use_device,
            );
            bunch_size
        };

        self.bunch_size = bunch_size;
        self.input = Some(input);
        Ok(Rc::clone(&self.output))
    }

    /// Records the error for the next update and hands it back unchanged.
    pub fn backward(&mut self, error: TokenRef) -> Result<TokenRef> {
        if self.weights.is_none() {
            return Err(not_built(&self.name));
        }

        {
            let token = error.borrow();
            let e = token.as_block("error")?;
            check_used(e.used_size(), self.bunch_size * self.size, "error")?;
        }

        self.error = Some(Rc::clone(&error));
        Ok(error)
    }

    /// Accumulates `-lr / sqrt(references * bunch) * Σ_bunch error` into the staged bias.
    pub fn update(&mut self, weights: &mut WeightRegistry) -> Result<()> {
        let learning_rate = self.params.learning_rate(&self.name)?;
        let error = self
            .error
            .as_ref()
            .ok_or_else(|| missing_token(&self.name, "error"))?;

        let mut token = error.borrow_mut();
        let e = token.as_block_mut("error")?;
        check_used(e.used_size(), self.bunch_size * self.size, "error")?;

        let matrix = matrix_of(weights, self.weights, &self.name)?;
        matrix.begin_update(self.params.momentum, self.params.weight_decay, self.use_device)?;

        let scale = matrix.update_scale(learning_rate, self.bunch_size);
        blas::saxpy_loop(
            self.size,
            scale,
            e.buffer_mut(),
            self.bunch_size,
            matrix.staging_mut(),
            1,
            self.bunch_size,
            1,
            0,
            self.use_device,
        );

        matrix.end_update();
        Ok(())
    }

    /// Zeroes the output and releases the input and error tokens.
    pub fn reset(&mut self) -> Result<()> {
        zero_token(&self.output, self.use_device)?;
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

impl Clone for BiasComponent {
    /// Clones the configuration, the clone is unbuilt.
    fn clone(&self) -> Self {
        let mut component = Self::new(&self.name, &self.weights_name);
        component.params = self.params;
        component.use_device = self.use_device;
        component
    }
}
