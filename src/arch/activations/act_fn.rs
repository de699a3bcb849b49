use super::{BinarySampling, Logistic, Softmax, Tanh, check_units, map_units, multiply_units};
use crate::{AnnErr, Result, arch::BunchConfig, buffer::MirroredBuffer};

/// The activation functions applied to a bunch of unit vectors.
///
/// Derivatives are always computed from the stored forward output.
#[derive(Clone, Debug)]
pub enum ActFn {
    Linear,
    Logistic(Logistic),
    Tanh(Tanh),
    Softmax(Softmax),
    BinarySampling(BinarySampling),
}

impl ActFn {
    pub fn linear() -> Self {
        Self::Linear
    }

    pub fn logistic() -> Self {
        Self::Logistic(Logistic)
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh)
    }

    pub fn softmax() -> Self {
        Self::Softmax(Softmax::new())
    }

    pub fn binary_sampling(seed: u64) -> Self {
        Self::BinarySampling(BinarySampling::from_seed(seed))
    }

    /// Creates a deterministic activation function from its type name.
    ///
    /// # Arguments
    /// * `name` - One of `inputs`, `linear`, `logistic`, `tanh` or `softmax`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "inputs" | "linear" => Ok(Self::linear()),
            "logistic" => Ok(Self::logistic()),
            "tanh" => Ok(Self::tanh()),
            "softmax" => Ok(Self::softmax()),
            other => Err(AnnErr::UnknownActivation(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Logistic(_) => "logistic",
            Self::Tanh(_) => "tanh",
            Self::Softmax(_) => "softmax",
            Self::BinarySampling(_) => "binary_sampling",
        }
    }

    /// Transforms in place `size` long unit vectors of the bunch described by `conf`.
    ///
    /// # Returns
    /// An error if the buffer is too small, a softmax is applied with a different size than the
    /// one it is locked to or the variant doesn't support the device.
    pub fn apply(
        &mut self,
        units: &mut MirroredBuffer,
        size: usize,
        conf: &BunchConfig,
        use_device: bool,
    ) -> Result<()> {
        check_units(units.len(), size, conf)?;

        match self {
            Self::Linear => {}
            Self::Logistic(a) => map_units(units.view_mut(use_device), size, conf, |x| a.f(x)),
            Self::Tanh(a) => map_units(units.view_mut(use_device), size, conf, |x| a.f(x)),
            Self::Softmax(a) => a.apply(units, size, conf, use_device)?,
            Self::BinarySampling(a) => a.apply(units, size, conf, use_device)?,
        }

        Ok(())
    }

    /// Multiplies `errors` by the derivative of the activation at the already computed `units`.
    pub fn multiply_derivatives(
        &self,
        units: &mut MirroredBuffer,
        errors: &mut MirroredBuffer,
        size: usize,
        conf: &BunchConfig,
        use_device: bool,
    ) -> Result<()> {
        check_units(units.len(), size, conf)?;
        check_units(errors.len(), size, conf)?;

        let df: fn(f32) -> f32 = match self {
            Self::Linear => return Ok(()),
            Self::Tanh(_) => |y| Tanh.df(y),
            // The softmax and sampled units share the logistic form.
            Self::Logistic(_) | Self::Softmax(_) | Self::BinarySampling(_) => |y| Logistic.df(y),
        };

        let units = units.view(use_device);
        multiply_units(units, errors.view_mut(use_device), size, conf, df);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn derivative_at(act: &mut ActFn, x: f32) -> (f32, f32) {
        let conf = BunchConfig::exact(1);
        let mut units = MirroredBuffer::from_vec(vec![x]);
        let mut errors = MirroredBuffer::from_vec(vec![1.]);

        act.apply(&mut units, 1, &conf, false).unwrap();
        act.multiply_derivatives(&mut units, &mut errors, 1, &conf, false)
            .unwrap();
        (units.read()[0], errors.read()[0])
    }

    #[test]
    fn test_logistic_at_zero() {
        let (y, d) = derivative_at(&mut ActFn::logistic(), 0.);
        assert_eq!(y, 0.5);
        assert_eq!(d, 0.25);
    }

    #[test]
    fn test_analytic_derivatives() {
        for x in [-3.0f32, -0.5, 0., 0.25, 2.] {
            let (y, d) = derivative_at(&mut ActFn::logistic(), x);
            let s = 1. / (1. + (-x).exp());
            assert!((y - s).abs() < EPS);
            assert!((d - s * (1. - s)).abs() < EPS);

            let (y, d) = derivative_at(&mut ActFn::tanh(), x);
            assert!((y - x.tanh()).abs() < EPS);
            assert!((d - (1. - x.tanh().powi(2))).abs() < EPS);

            let (y, d) = derivative_at(&mut ActFn::linear(), x);
            assert_eq!((y, d), (x, 1.));
        }
    }

    #[test]
    fn test_only_current_bunch_is_touched() {
        // Two units, room for three patterns, two of them in use.
        let conf = BunchConfig::new(3, 2);
        let mut units = MirroredBuffer::from_vec(vec![0., 0., 9., 0., 0., 9.]);
        ActFn::logistic()
            .apply(&mut units, 2, &conf, false)
            .unwrap();
        assert_eq!(units.read(), &[0.5, 0.5, 9., 0.5, 0.5, 9.]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let rows = [[1., 2., 3.], [1000., 1000., 1000.], [-50., 0., 50.]];
        let conf = BunchConfig::exact(rows.len());
        let mut data = vec![0.; 9];
        for (b, row) in rows.iter().enumerate() {
            row.iter().enumerate().for_each(|(i, &x)| data[i * 3 + b] = x);
        }

        for use_device in [false, true] {
            let mut units = MirroredBuffer::from_vec(data.clone());
            ActFn::softmax()
                .apply(&mut units, 3, &conf, use_device)
                .unwrap();

            let u = units.read();
            for b in 0..rows.len() {
                let sum: f32 = (0..3).map(|i| u[i * 3 + b]).sum();
                assert!(u.iter().all(|x| x.is_finite()));
                assert!((sum - 1.).abs() < EPS, "pattern {b} sums {sum}");
            }
            assert!((u[1] - 1. / 3.).abs() < EPS);
        }
    }

    #[test]
    fn test_softmax_size_is_locked() {
        let conf = BunchConfig::exact(1);
        let mut act = ActFn::softmax();
        act.apply(&mut MirroredBuffer::new(3), 3, &conf, false)
            .unwrap();

        assert_eq!(
            act.apply(&mut MirroredBuffer::new(4), 4, &conf, false),
            Err(AnnErr::SoftmaxSizeLocked { locked: 3, got: 4 })
        );

        let mut fresh = act.clone();
        fresh
            .apply(&mut MirroredBuffer::new(4), 4, &conf, false)
            .unwrap();
    }

    #[test]
    fn test_binary_sampling() {
        let conf = BunchConfig::exact(4);
        let mut units = MirroredBuffer::from_vec(vec![-100., 100., 0., 0.3, 0., 0., 0., 0.]);
        let mut act = ActFn::binary_sampling(3);
        let mut clone = act.clone();

        act.apply(&mut units, 2, &conf, false).unwrap();
        let u = units.read().to_vec();
        assert_eq!(&u[..2], &[0., 1.]);
        assert!(u.iter().all(|&x| x == 0. || x == 1.));

        let mut again = MirroredBuffer::from_vec(vec![-100., 100., 0., 0.3, 0., 0., 0., 0.]);
        clone.apply(&mut again, 2, &conf, false).unwrap();
        assert_eq!(again.read(), u.as_slice());
    }

    #[test]
    fn test_binary_sampling_on_device() {
        let conf = BunchConfig::exact(1);
        assert_eq!(
            ActFn::binary_sampling(0).apply(&mut MirroredBuffer::new(1), 1, &conf, true),
            Err(AnnErr::NotImplemented("binary sampling on the device"))
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ActFn::from_name("inputs").unwrap().name(), "linear");
        assert_eq!(ActFn::from_name("tanh").unwrap().name(), "tanh");
        assert!(ActFn::from_name("relu").is_err());
    }
}
