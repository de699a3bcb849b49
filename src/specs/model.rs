use serde::{Deserialize, Serialize};

use crate::{
    Result,
    arch::{Sequential, activations::ActFn, components::Component},
};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Linear,
    Logistic,
    Tanh,
    Softmax,
    BinarySampling { seed: u64 },
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Linear => ActFn::linear(),
            ActFnSpec::Logistic => ActFn::logistic(),
            ActFnSpec::Tanh => ActFn::tanh(),
            ActFnSpec::Softmax => ActFn::softmax(),
            ActFnSpec::BinarySampling { seed } => ActFn::binary_sampling(seed),
        }
    }
}

/// The specification for the `Component` enum.
///
/// A missing `weights` name defaults to the component name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSpec {
    Bias {
        name: String,
        weights: Option<String>,
    },
    Dense {
        name: String,
        weights: Option<String>,
        output: usize,
    },
    Activation {
        name: String,
        act_fn: ActFnSpec,
    },
}

impl From<ComponentSpec> for Component {
    fn from(spec: ComponentSpec) -> Self {
        match spec {
            ComponentSpec::Bias { name, weights } => {
                let weights = weights.unwrap_or_else(|| name.clone());
                Component::bias(&name, &weights)
            }
            ComponentSpec::Dense {
                name,
                weights,
                output,
            } => {
                let weights = weights.unwrap_or_else(|| name.clone());
                Component::dense(&name, &weights, output)
            }
            ComponentSpec::Activation { name, act_fn } => Component::activation(&name, act_fn.into()),
        }
    }
}

/// The specification for the `Sequential` model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub input_size: usize,
    pub components: Vec<ComponentSpec>,
}

impl Sequential {
    /// Creates and builds a `Sequential` from its specification.
    pub fn from_spec(spec: ModelSpec) -> Result<Self> {
        let mut model = Sequential::new(spec.components.into_iter().map(Component::from));
        model.build(spec.input_size)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "input_size": 2,
            "components": [
                { "dense": { "name": "l1", "weights": null, "output": 3 } },
                { "bias": { "name": "b1", "weights": "shared" } },
                { "activation": { "name": "a1", "act_fn": "tanh" } },
                { "bias": { "name": "b2", "weights": "shared" } },
                { "activation": { "name": "a2", "act_fn": { "binary_sampling": { "seed": 3 } } } }
            ]
        }"#;

        let spec: ModelSpec = serde_json::from_str(json).unwrap();
        let model = Sequential::from_spec(spec).unwrap();

        assert_eq!(model.output_size(), 3);
        assert_eq!(model.weights().len(), 2);
        assert!(model.weights().id_of("l1").is_some());
        let shared = model.weights().id_of("shared").unwrap();
        assert_eq!(model.weights().get(shared).unwrap().num_references(), 2);
        assert_eq!(model.components()[2].name(), "a1");
    }
}
