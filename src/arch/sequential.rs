use log::{debug, info};
use rand::Rng;

use super::{
    components::{Component, ComponentDict},
    loss::LossFn,
};
use crate::{AnnErr, Result, token::TokenRef, weights::WeightRegistry};

/// A chain of components sharing one weight registry: information flows forward when computing
/// an output and backward when computing the errors of its components.
#[derive(Debug, Default)]
pub struct Sequential {
    components: Vec<Component>,
    weights: WeightRegistry,
    dict: ComponentDict,
    input_size: usize,
    built: bool,
}

impl Sequential {
    /// Creates a new unbuilt `Sequential`.
    ///
    /// # Arguments
    /// * `components` - The components the sequential is composed of, in forward order.
    pub fn new<I>(components: I) -> Self
    where
        I: IntoIterator<Item = Component>,
    {
        Self {
            components: components.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Appends a component, the chain must be built again afterwards.
    pub fn push(&mut self, component: Component) {
        self.components.push(component);
        self.built = false;
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn weights(&self) -> &WeightRegistry {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut WeightRegistry {
        &mut self.weights
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Returns the output size of the last component, zero while unbuilt.
    pub fn output_size(&self) -> usize {
        match self.components.last() {
            Some(last) if self.built => last.output_size(),
            _ => 0,
        }
    }

    /// Builds every component chaining their sizes.
    ///
    /// Size preserving components take the output size of the previous one. Weights already in
    /// the registry are kept, their references are counted again from zero.
    ///
    /// # Arguments
    /// * `input_size` - The size of the input vectors of the first component.
    pub fn build(&mut self, input_size: usize) -> Result<()> {
        if self.components.is_empty() {
            return Err(AnnErr::ZeroSize { what: "sequential" });
        }

        self.built = false;
        self.weights = self.weights.clone();
        self.dict = ComponentDict::new();

        let mut size = input_size;
        for component in self.components.iter_mut() {
            let output_size = component.declared_output_size().unwrap_or(size);
            component.build(size, output_size, &mut self.weights, &mut self.dict)?;
            size = output_size;
        }

        self.input_size = input_size;
        self.built = true;
        info!(
            components = self.components.len(), weights = self.weights.len();
            "built sequential of {input_size} -> {size}"
        );
        Ok(())
    }

    /// Makes a forward pass through every component.
    pub fn forward(&mut self, input: TokenRef, training: bool) -> Result<TokenRef> {
        self.check_built()?;

        self.components
            .iter_mut()
            .try_fold(input, |x, component| {
                component.forward(&mut self.weights, x, training)
            })
    }

    /// Makes a backward pass through every component, in reverse order.
    ///
    /// # Returns
    /// The error with respect to the input of the chain.
    pub fn backward(&mut self, error: TokenRef) -> Result<TokenRef> {
        self.check_built()?;

        self.components
            .iter_mut()
            .rev()
            .try_fold(error, |e, component| component.backward(&mut self.weights, e))
    }

    /// Lets every component contribute its gradient, shared matrices swap on the last one.
    pub fn update(&mut self) -> Result<()> {
        self.check_built()?;

        for component in self.components.iter_mut() {
            component.update(&mut self.weights)?;
        }

        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        for component in self.components.iter_mut() {
            component.reset()?;
        }

        Ok(())
    }

    /// Trains on one bunch.
    ///
    /// # Arguments
    /// * `input` - The input bunch.
    /// * `target` - The expected output bunch.
    /// * `loss` - The loss function, its accumulator keeps the bunch loss.
    ///
    /// # Returns
    /// The loss of the bunch before updating the weights.
    pub fn train_step<L>(&mut self, input: TokenRef, target: &TokenRef, loss: &mut L) -> Result<f32>
    where
        L: LossFn + ?Sized,
    {
        let output = self.forward(input, true)?;
        let bunch_loss = loss.add_loss(&output, target)?;
        let error = loss.compute_gradient(&output, target)?;

        self.backward(error)?;
        self.update()?;
        Ok(bunch_loss)
    }

    /// Computes the loss of one bunch without training.
    pub fn evaluate<L>(&mut self, input: TokenRef, target: &TokenRef, loss: &mut L) -> Result<f32>
    where
        L: LossFn + ?Sized,
    {
        let output = self.forward(input, false)?;
        loss.add_loss(&output, target)
    }

    /// Randomizes every weight matrix, in the order they were created.
    pub fn randomize_weights<R>(&mut self, rng: &mut R, low: f32, high: f32) -> Result<()>
    where
        R: Rng + ?Sized,
    {
        self.check_built()?;

        for (name, matrix) in self.weights.iter_mut() {
            debug!("randomizing weights '{name}' in [{low}, {high}]");
            matrix.randomize_weights(rng, low, high)?;
        }

        Ok(())
    }

    /// Sets an option on every component that has it.
    ///
    /// # Returns
    /// An `UnknownOption` error if no component has it.
    pub fn set_option(&mut self, option: &str, value: f64) -> Result<()> {
        let mut found = false;

        for component in self.components.iter_mut() {
            if component.has_option(option) {
                component.set_option(option, value)?;
                found = true;
            }
        }

        if !found {
            return Err(AnnErr::UnknownOption {
                component: "sequential".to_string(),
                option: option.to_string(),
            });
        }

        Ok(())
    }

    /// Flushes subnormal weights and checks that every weight is finite.
    pub fn check_weights(&mut self) -> Result<()> {
        for (_, matrix) in self.weights.iter_mut() {
            matrix.prune_subnormal_and_check_normal()?;
        }

        Ok(())
    }

    /// Collects the weights of every component into a new registry.
    ///
    /// Tied components export their matrix once.
    pub fn copy_weights(&self) -> Result<WeightRegistry> {
        self.check_built()?;

        let mut registry = WeightRegistry::new();
        for component in self.components.iter() {
            component.copy_weights(&self.weights, &mut registry)?;
        }

        Ok(registry)
    }

    /// Deep copies the chain and its weights, the copy is built again if the chain was built.
    pub fn try_clone(&self) -> Result<Self> {
        let mut clone = Self {
            components: self.components.clone(),
            weights: self.weights.clone(),
            ..Default::default()
        };

        if self.built {
            clone.build(self.input_size)?;
        }

        Ok(clone)
    }

    fn check_built(&self) -> Result<()> {
        if !self.built {
            return Err(AnnErr::NotBuilt {
                component: "sequential".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        arch::{activations::ActFn, loss::Mse},
        token::{TokenBlock, bunch_from_rows, rows_of},
    };

    fn xor_model() -> Sequential {
        let mut model = Sequential::new([
            Component::dense("l1", "w1", 2),
            Component::bias("b1", "b1"),
            Component::activation("a1", ActFn::logistic()),
            Component::dense("l2", "w2", 1),
            Component::bias("b2", "b2"),
            Component::activation("a2", ActFn::logistic()),
        ]);
        model.build(2).unwrap();
        model
    }

    #[test]
    fn test_build_chains_sizes() {
        let model = xor_model();
        assert_eq!(model.input_size(), 2);
        assert_eq!(model.output_size(), 1);
        assert_eq!(model.weights().len(), 4);

        let sizes: Vec<_> = model
            .components()
            .iter()
            .map(|c| (c.input_size(), c.output_size()))
            .collect();
        assert_eq!(sizes, [(2, 2), (2, 2), (2, 2), (2, 1), (1, 1), (1, 1)]);
    }

    #[test]
    fn test_unbuilt() {
        let mut model = Sequential::new([Component::bias("b1", "b1")]);
        assert!(matches!(
            model.forward(TokenBlock::new(2).into_ref(), false),
            Err(AnnErr::NotBuilt { .. })
        ));
        assert!(matches!(
            Sequential::default().build(2),
            Err(AnnErr::ZeroSize { .. })
        ));
    }

    #[test]
    fn test_rebuilding_keeps_references() {
        let mut model = xor_model();
        model.build(2).unwrap();

        for (_, matrix) in model.weights().iter() {
            assert_eq!(matrix.num_references(), 1);
        }
    }

    #[test]
    fn test_set_option_broadcast() {
        let mut model = xor_model();
        model.set_option("learning_rate", 0.2).unwrap();
        assert_eq!(
            model.components()[0].get_option("learning_rate").unwrap(),
            0.2f32 as f64
        );
        assert!(matches!(
            model.set_option("dropout", 0.1),
            Err(AnnErr::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_learns_xor() {
        let mut model = xor_model();
        let mut rng = StdRng::seed_from_u64(7);
        model.randomize_weights(&mut rng, -1., 1.).unwrap();
        model.set_option("learning_rate", 2.).unwrap();
        model.set_option("momentum", 0.5).unwrap();

        let x = [[0f32, 0.], [0., 1.], [1., 0.], [1., 1.]];
        let y = [[0f32], [1.], [1.], [0.]];
        let target = bunch_from_rows(&y).unwrap().into_ref();
        let mut loss = Mse::new(1).unwrap();

        let mut first = None;
        let mut last = 0.;
        for _ in 0..3000 {
            let input = bunch_from_rows(&x).unwrap().into_ref();
            last = model.train_step(input, &target, &mut loss).unwrap();
            first.get_or_insert(last);
        }

        model.check_weights().unwrap();
        assert!(last < first.unwrap(), "loss went from {first:?} to {last}");
    }

    #[test]
    fn test_try_clone_copies_weights() {
        let mut model = xor_model();
        let mut rng = StdRng::seed_from_u64(1);
        model.randomize_weights(&mut rng, -1., 1.).unwrap();

        let mut clone = model.try_clone().unwrap();
        assert!(clone.is_built());

        let first = bunch_from_rows(&[[1f32, 0.]]).unwrap();
        let second = bunch_from_rows(&[[-5f32, 7.]]).unwrap();

        let out = model.forward(first.clone().into_ref(), false).unwrap();
        let before = rows_of(out.borrow_mut().as_block_mut("out").unwrap(), 1).unwrap();

        let cloned_out = clone.forward(second.clone().into_ref(), false).unwrap();
        assert!(!Rc::ptr_eq(&out, &cloned_out));

        let after = rows_of(out.borrow_mut().as_block_mut("out").unwrap(), 1).unwrap();
        assert_eq!(before, after);

        // Same weights give the same outputs on the same input.
        let expected = model.forward(second.into_ref(), false).unwrap();
        let expected = rows_of(expected.borrow_mut().as_block_mut("expected").unwrap(), 1).unwrap();
        let got = rows_of(cloned_out.borrow_mut().as_block_mut("got").unwrap(), 1).unwrap();
        assert_eq!(expected, got);

        // The clone owns its own matrices.
        clone.weights_mut().by_name_mut("w1").unwrap().scale(0.);
        let out = model.forward(first.into_ref(), false).unwrap();
        let out = rows_of(out.borrow_mut().as_block_mut("out").unwrap(), 1).unwrap();
        assert_eq!(before, out);
    }

    #[test]
    fn test_copy_weights_exports_tied_matrix_once() {
        let mut model = Sequential::new([
            Component::bias("b1", "shared"),
            Component::bias("b2", "shared"),
        ]);
        model.build(3).unwrap();
        assert_eq!(model.weights().len(), 1);

        let registry = model.copy_weights().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.id_of("shared").is_some());
    }
}
