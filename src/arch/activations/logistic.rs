/// The logistic (sigmoid) function.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logistic;

impl Logistic {
    pub fn f(&self, x: f32) -> f32 {
        1. / (1. + (-x).exp())
    }

    /// The derivative expressed through the function's output `y`.
    pub fn df(&self, y: f32) -> f32 {
        y * (1. - y)
    }
}
