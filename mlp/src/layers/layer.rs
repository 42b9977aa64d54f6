use std::num::NonZeroUsize;

use ndarray::Array2;
use solver::{Result, SolverErr};

use super::{Dense, Input, MseLoss, Stage};
use crate::Act;

/// One stage of a sequential network.
#[derive(Debug)]
pub enum Layer {
    Input(Input),
    Dense(Dense),
    MseLoss(MseLoss),
}
use Layer::*;

impl Layer {
    /// Entry layer over a `(features, targets)` dataset.
    ///
    /// # Errors
    /// Returns `SolverErr::ShapeMismatch` for an empty or ragged dataset.
    pub fn input(data_x: Array2<f32>, data_y: Array2<f32>, batch: NonZeroUsize) -> Result<Self> {
        Ok(Self::Input(Input::new(data_x, data_y, batch)?))
    }

    /// Fully connected layer of shape `dim`, optionally activated.
    pub fn dense(dim: (usize, usize), act: Option<Act>) -> Self {
        Self::Dense(Dense::new(dim, act))
    }

    /// Mean squared error scoring layer.
    pub fn mse() -> Self {
        Self::MseLoss(MseLoss::new())
    }

    /// The amount of learnable parameters this layer owns.
    pub fn size(&self) -> usize {
        match self {
            Dense(l) => l.size(),
            Input(_) | MseLoss(_) => 0,
        }
    }

    /// Runs the layer forward. `x` is the output of the layer below (`None`
    /// at the bottom of the stack); returns the layer output and its loss
    /// contribution.
    pub fn forward(
        &mut self,
        layer: usize,
        params: &[f32],
        x: Option<&Array2<f32>>,
        stage: &mut Stage,
    ) -> Result<(Array2<f32>, f32)> {
        match self {
            Input(l) => {
                let (x, y) = l.next_batch();
                stage.target = y;
                Ok((x, 0.0))
            }
            Dense(l) => {
                let x = x.ok_or(SolverErr::Topology {
                    layer,
                    what: "dense layer with nothing below it",
                })?;
                Ok((l.forward(layer, params, x)?, 0.0))
            }
            MseLoss(l) => {
                let x = x.ok_or(SolverErr::Topology {
                    layer,
                    what: "loss layer with nothing below it",
                })?;
                l.forward(x, stage)
            }
        }
    }

    /// Runs the layer backward. `d` is the loss gradient with respect to the
    /// layer output (ignored by the scoring layer, which seeds the sweep);
    /// returns the gradient with respect to the layer input, if any.
    pub fn backward(
        &mut self,
        layer: usize,
        params: &[f32],
        grads: &mut [f32],
        d: Option<&Array2<f32>>,
    ) -> Result<Option<Array2<f32>>> {
        match self {
            Input(_) => Ok(None),
            Dense(l) => {
                let d = d.ok_or(SolverErr::Topology {
                    layer,
                    what: "no delta from the layer above",
                })?;
                Ok(Some(l.backward(layer, params, grads, d)?))
            }
            MseLoss(l) => Ok(Some(l.backward())),
        }
    }
}
