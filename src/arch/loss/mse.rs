use std::rc::Rc;

use log::debug;

use super::{LossAccum, LossFn, with_pair};
use crate::{
    AnnErr, Result,
    token::{TokenBlock, TokenRef},
};

/// Mean squared error loss function, `0.5 / bunch * Σ (o - t)²`.
#[derive(Debug)]
pub struct Mse {
    size: usize,
    accum: LossAccum,
    error: TokenRef,
}

impl Mse {
    /// Creates a new `Mse` comparing `size` long vectors.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(AnnErr::ZeroSize { what: "mse loss" });
        }

        Ok(Self {
            size,
            accum: LossAccum::default(),
            error: TokenBlock::new(size).into_ref(),
        })
    }
}

impl LossFn for Mse {
    fn size(&self) -> usize {
        self.size
    }

    fn add_loss(&mut self, output: &TokenRef, target: &TokenRef) -> Result<f32> {
        let loss = with_pair(output, target, self.size, |o, t, bunch_size| {
            let sum: f32 = o.iter().zip(t).map(|(o, t)| (o - t).powi(2)).sum();
            0.5 * sum / bunch_size as f32
        })?;

        self.accum.add(loss);
        Ok(loss)
    }

    fn compute_gradient(&mut self, output: &TokenRef, target: &TokenRef) -> Result<TokenRef> {
        let gradient = with_pair(output, target, self.size, |o, t, _| {
            o.iter().zip(t).map(|(o, t)| o - t).collect::<Vec<_>>()
        })?;

        let mut error = self.error.borrow_mut();
        let e = error.as_block_mut("error")?;
        e.resize(gradient.len());
        e.read_write().copy_from_slice(&gradient);
        drop(error);

        Ok(Rc::clone(&self.error))
    }

    fn accum_loss(&self) -> f32 {
        self.accum.mean()
    }

    fn reset(&mut self) {
        debug!("mse loss reset after {} bunches", self.accum.count);
        self.accum = LossAccum::default();
        self.error = TokenBlock::new(self.size).into_ref();
    }
}
