use std::collections::HashMap;

use log::debug;

use crate::{AnnErr, Result};

/// The training hyperparameters of a weighted component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparams {
    /// Negative while unset, updating a component with no learning rate is an error.
    pub learning_rate: f32,
    pub momentum: f32,
    pub weight_decay: f32,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            learning_rate: -1.,
            momentum: 0.,
            weight_decay: 0.,
        }
    }
}

impl Hyperparams {
    pub const NAMES: [&'static str; 3] = ["learning_rate", "momentum", "weight_decay"];

    /// Returns whether `option` names one of the hyperparameters.
    pub fn has(option: &str) -> bool {
        Self::NAMES.contains(&option)
    }

    /// Sets the hyperparameter named `option`.
    ///
    /// # Arguments
    /// * `component` - The name of the owner, used for the error message.
    /// * `option` - The hyperparameter name.
    /// * `value` - Its new value.
    ///
    /// # Returns
    /// An `UnknownOption` error if there's no such hyperparameter.
    pub fn set(&mut self, component: &str, option: &str, value: f64) -> Result<()> {
        let slot = match option {
            "learning_rate" => &mut self.learning_rate,
            "momentum" => &mut self.momentum,
            "weight_decay" => &mut self.weight_decay,
            _ => return Err(unknown_option(component, option)),
        };

        *slot = value as f32;
        Ok(())
    }

    pub fn get(&self, component: &str, option: &str) -> Result<f64> {
        let value = match option {
            "learning_rate" => self.learning_rate,
            "momentum" => self.momentum,
            "weight_decay" => self.weight_decay,
            _ => return Err(unknown_option(component, option)),
        };

        Ok(value as f64)
    }

    /// Returns the learning rate or a `MissingLearningRate` error if it isn't positive.
    pub fn learning_rate(&self, component: &str) -> Result<f32> {
        if self.learning_rate <= 0. {
            return Err(AnnErr::MissingLearningRate {
                component: component.to_string(),
            });
        }

        Ok(self.learning_rate)
    }
}

pub(super) fn unknown_option(component: &str, option: &str) -> AnnErr {
    AnnErr::UnknownOption {
        component: component.to_string(),
        option: option.to_string(),
    }
}

/// Records the name and shape of every component built into a model.
#[derive(Debug, Clone, Default)]
pub struct ComponentDict {
    shapes: HashMap<String, (usize, usize)>,
}

impl ComponentDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a built component.
    ///
    /// # Returns
    /// A `DuplicateComponent` error if `name` was registered with a different shape.
    pub fn register(&mut self, name: &str, input_size: usize, output_size: usize) -> Result<()> {
        match self.shapes.get(name) {
            Some(&shape) if shape != (input_size, output_size) => Err(AnnErr::DuplicateComponent {
                name: name.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                debug!(inputs = input_size, outputs = output_size; "built component '{name}'");
                self.shapes.insert(name.to_string(), (input_size, output_size));
                Ok(())
            }
        }
    }

    pub fn shape_of(&self, name: &str) -> Option<(usize, usize)> {
        self.shapes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
