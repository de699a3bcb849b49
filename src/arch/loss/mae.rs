use std::rc::Rc;

use log::debug;

use super::{LossAccum, LossFn, NEAR_ZERO, with_pair};
use crate::{
    AnnErr, Result,
    token::{TokenBlock, TokenRef},
};

/// Mean absolute error loss function, `1 / bunch * Σ |o - t|`.
#[derive(Debug)]
pub struct Mae {
    size: usize,
    accum: LossAccum,
    error: Option<TokenRef>,
}

impl Mae {
    /// Creates a new `Mae` comparing `size` long vectors.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(AnnErr::ZeroSize { what: "mae loss" });
        }

        Ok(Self {
            size,
            accum: LossAccum::default(),
            error: None,
        })
    }
}

impl LossFn for Mae {
    fn size(&self) -> usize {
        self.size
    }

    fn add_loss(&mut self, output: &TokenRef, target: &TokenRef) -> Result<f32> {
        let loss = with_pair(output, target, self.size, |o, t, bunch_size| {
            let sum: f32 = o.iter().zip(t).map(|(o, t)| (o - t).abs()).sum();
            sum / bunch_size as f32
        })?;

        self.accum.add(loss);
        Ok(loss)
    }

    /// The gradient is the sign of `o - t`, zero where both are closer than `NEAR_ZERO`.
    fn compute_gradient(&mut self, output: &TokenRef, target: &TokenRef) -> Result<TokenRef> {
        let gradient = with_pair(output, target, self.size, |o, t, _| {
            o.iter()
                .zip(t)
                .map(|(o, t)| {
                    let d = o - t;
                    if d.abs() < NEAR_ZERO { 0. } else { d.signum() }
                })
                .collect::<Vec<_>>()
        })?;

        let error = TokenBlock::from_vec(gradient).into_ref();
        self.error = Some(Rc::clone(&error));
        Ok(error)
    }

    fn accum_loss(&self) -> f32 {
        self.accum.mean()
    }

    fn reset(&mut self) {
        debug!("mae loss reset after {} bunches", self.accum.count);
        self.accum = LossAccum::default();
        self.error = None;
    }
}
