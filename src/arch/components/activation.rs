use std::rc::Rc;

use super::{
    ComponentDict, bunch_size_of, check_used, empty_token, missing_token, not_built,
    options::unknown_option, zero_token,
};
use crate::{
    AnnErr, Result,
    arch::{BunchConfig, activations::ActFn},
    buffer::blas,
    token::TokenRef,
};

/// Applies an activation function to every unit of the bunch.
#[derive(Debug)]
pub struct ActivationComponent {
    name: String,
    act_fn: ActFn,
    size: usize,
    bunch_size: usize,
    use_device: bool,
    input: Option<TokenRef>,
    output: TokenRef,
    error_output: TokenRef,
}

impl ActivationComponent {
    pub fn new(name: &str, act_fn: ActFn) -> Self {
        Self {
            name: name.to_string(),
            act_fn,
            size: 0,
            bunch_size: 0,
            use_device: false,
            input: None,
            output: empty_token(),
            error_output: empty_token(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn act_fn(&self) -> &ActFn {
        &self.act_fn
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bunch_size(&self) -> usize {
        self.bunch_size
    }

    pub fn build(
        &mut self,
        input_size: usize,
        output_size: usize,
        components: &mut ComponentDict,
    ) -> Result<()> {
        if input_size == 0 || output_size == 0 {
            return Err(AnnErr::ZeroSize {
                what: "activation component",
            });
        }

        if input_size != output_size {
            return Err(AnnErr::SizeMismatch {
                a: "activation inputs",
                b: "activation outputs",
                got: input_size,
                expected: output_size,
            });
        }

        components.register(&self.name, input_size, output_size)?;
        self.size = output_size;
        Ok(())
    }

    pub fn forward(&mut self, input: TokenRef) -> Result<TokenRef> {
        if self.size == 0 {
            return Err(not_built(&self.name));
        }

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

            let conf = BunchConfig::exact(bunch_size);
            self.act_fn
                .apply(y.buffer_mut(), self.size, &conf, use_device)?;
            bunch_size
        };

        self.bunch_size = bunch_size;
        self.input = Some(input);
        Ok(Rc::clone(&self.output))
    }

    /// Multiplies the error by the derivative at the last forward output.
    pub fn backward(&mut self, error: TokenRef) -> Result<TokenRef> {
        if self.input.is_none() {
            return Err(missing_token(&self.name, "input"));
        }

        let use_device = self.use_device;
        let n = self.bunch_size * self.size;

        let mut token = error.borrow_mut();
        let e = token.as_block_mut("error")?;
        check_used(e.used_size(), n, "error")?;

        let mut error_output = self.error_output.borrow_mut();
        let d = error_output.as_block_mut("error output")?;
        d.resize(n);
        blas::scopy(n, e.buffer_mut(), 0, 1, d.buffer_mut(), 0, 1, use_device);

        let mut output = self.output.borrow_mut();
        let y = output.as_block_mut("output")?;
        let conf = BunchConfig::exact(self.bunch_size);
        self.act_fn
            .multiply_derivatives(y.buffer_mut(), d.buffer_mut(), self.size, &conf, use_device)?;

        Ok(Rc::clone(&self.error_output))
    }

    pub fn reset(&mut self) -> Result<()> {
        zero_token(&self.output, self.use_device)?;
        zero_token(&self.error_output, self.use_device)?;
        self.input = None;
        Ok(())
    }

    pub fn has_option(&self, option: &str) -> bool {
        option == "use_device"
    }

    pub fn set_option(&mut self, option: &str, value: f64) -> Result<()> {
        match option {
            "use_device" => {
                self.use_device = value != 0.;
                Ok(())
            }
            _ => Err(unknown_option(&self.name, option)),
        }
    }

    pub fn get_option(&self, option: &str) -> Result<f64> {
        match option {
            "use_device" => Ok(if self.use_device { 1. } else { 0. }),
            _ => Err(unknown_option(&self.name, option)),
        }
    }
}

impl Clone for ActivationComponent {
    /// Clones the configuration, the clone is unbuilt.
    fn clone(&self) -> Self {
        let mut component = Self::new(&self.name, self.act_fn.clone());
        component.use_device = self.use_device;
        component
    }
}
