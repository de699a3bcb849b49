use std::collections::HashMap;

use log::debug;

use super::WeightMatrix;
use crate::{AnnErr, Result};

/// A copyable handle to a matrix owned by a `WeightRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightId(usize);

/// Owns every weight matrix of a model by name.
///
/// Components resolve their matrices through the registry while being built and keep a
/// `WeightId` afterwards. Two components naming the same weights share one matrix.
#[derive(Debug, Clone, Default)]
pub struct WeightRegistry {
    matrices: Vec<WeightMatrix>,
    names: Vec<String>,
    ids: HashMap<String, WeightId>,
}

impl WeightRegistry {
    /// Creates a new empty `WeightRegistry`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Resolves the matrix named `name`, creating a zeroed one if there's none.
    ///
    /// # Arguments
    /// * `name` - The name of the weights.
    /// * `num_inputs` - The expected amount of inputs.
    /// * `num_outputs` - The expected amount of outputs.
    ///
    /// # Returns
    /// The handle of the matrix or an error if an existing matrix has a different shape.
    pub fn get_or_insert(&mut self, name: &str, num_inputs: usize, num_outputs: usize) -> Result<WeightId> {
        if let Some(&id) = self.ids.get(name) {
            self.matrices[id.0].check_sizes(num_inputs, num_outputs)?;
            debug!("sharing weights '{name}'");
            return Ok(id);
        }

        let matrix = WeightMatrix::new(num_inputs, num_outputs)?;
        debug!("created weights '{name}' of {num_inputs}x{num_outputs}");
        Ok(self.insert(name, matrix))
    }

    /// Stores `matrix` under `name`, replacing the previous matrix with that name if any.
    pub fn insert(&mut self, name: &str, matrix: WeightMatrix) -> WeightId {
        if let Some(&id) = self.ids.get(name) {
            self.matrices[id.0] = matrix;
            return id;
        }

        let id = WeightId(self.matrices.len());
        self.matrices.push(matrix);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<WeightId> {
        self.ids.get(name).copied()
    }

    pub fn get(&self, id: WeightId) -> Option<&WeightMatrix> {
        self.matrices.get(id.0)
    }

    pub fn get_mut(&mut self, id: WeightId) -> Option<&mut WeightMatrix> {
        self.matrices.get_mut(id.0)
    }

    /// Returns the matrix named `name` or a `MissingWeights` error.
    pub fn by_name_mut(&mut self, name: &str) -> Result<&mut WeightMatrix> {
        let id = self.id_of(name).ok_or_else(|| AnnErr::MissingWeights {
            name: name.to_string(),
        })?;

        Ok(&mut self.matrices[id.0])
    }

    /// Iterates over the matrices in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WeightMatrix)> {
        self.names.iter().map(String::as_str).zip(&self.matrices)
    }

    /// Mutable version of `iter`.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut WeightMatrix)> {
        self.names.iter().map(String::as_str).zip(&mut self.matrices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_same_matrix() {
        let mut registry = WeightRegistry::new();
        let a = registry.get_or_insert("b1", 1, 3).unwrap();
        let b = registry.get_or_insert("b1", 1, 3).unwrap();
        let c = registry.get_or_insert("b2", 1, 3).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_shape_conflict() {
        let mut registry = WeightRegistry::new();
        registry.get_or_insert("w", 2, 3).unwrap();
        assert!(matches!(
            registry.get_or_insert("w", 3, 3),
            Err(AnnErr::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_clone_drops_references() {
        let mut registry = WeightRegistry::new();
        let id = registry.get_or_insert("w", 2, 2).unwrap();
        registry.get_mut(id).unwrap().count_reference();

        let copy = registry.clone();
        assert_eq!(copy.get(id).unwrap().num_references(), 0);
        assert_eq!(copy.iter().map(|(name, _)| name).collect::<Vec<_>>(), ["w"]);
    }
}
