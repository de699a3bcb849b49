use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{Logistic, check_units, map_units};
use crate::{AnnErr, Result, arch::BunchConfig, buffer::MirroredBuffer};

/// Samples every unit as a Bernoulli variable of probability `sigmoid(x)`.
///
/// Cloning duplicates the generator state, so clones produce the same stream independently of
/// each other.
#[derive(Clone, Debug)]
pub struct BinarySampling {
    rng: StdRng,
}

impl BinarySampling {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn apply(
        &mut self,
        units: &mut MirroredBuffer,
        size: usize,
        conf: &BunchConfig,
        use_device: bool,
    ) -> Result<()> {
        if use_device {
            return Err(AnnErr::NotImplemented("binary sampling on the device"));
        }

        check_units(units.len(), size, conf)?;
        let rng = &mut self.rng;

        map_units(units.read_write(), size, conf, |x| {
            if rng.random::<f32>() < Logistic.f(x) {
                1.
            } else {
                0.
            }
        });

        Ok(())
    }

    /// Overwrites the units with uniform values in `[0, 1)`.
    pub fn randomize(
        &mut self,
        units: &mut MirroredBuffer,
        size: usize,
        conf: &BunchConfig,
        use_device: bool,
    ) -> Result<()> {
        if use_device {
            return Err(AnnErr::NotImplemented("binary sampling on the device"));
        }

        check_units(units.len(), size, conf)?;
        let rng = &mut self.rng;
        map_units(units.read_write(), size, conf, |_| rng.random::<f32>());
        Ok(())
    }
}
