/// The hyperbolic tangent.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tanh;

impl Tanh {
    pub fn f(&self, x: f32) -> f32 {
        x.tanh()
    }

    /// The derivative expressed through the function's output `y`.
    pub fn df(&self, y: f32) -> f32 {
        1. - y * y
    }
}
