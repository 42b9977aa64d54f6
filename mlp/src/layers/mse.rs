use ndarray::Array2;
use solver::{Result, SolverErr};

use super::Stage;

/// Mean squared error scoring layer. Sits at the top of the stack, passes
/// its input through unchanged and contributes the pass loss.
#[derive(Debug, Clone)]
pub struct MseLoss {
    pred: Array2<f32>,
    target: Array2<f32>,
}

impl MseLoss {
    pub fn new() -> Self {
        Self {
            pred: Array2::zeros((0, 0)),
            target: Array2::zeros((0, 0)),
        }
    }

    /// Scores `x` against the targets staged by the input layer.
    ///
    /// # Errors
    /// Returns `SolverErr::ShapeMismatch` if `x` and the staged targets
    /// disagree in shape.
    pub fn forward(&mut self, x: &Array2<f32>, stage: &Stage) -> Result<(Array2<f32>, f32)> {
        if x.dim() != stage.target.dim() {
            return Err(SolverErr::ShapeMismatch {
                what: "loss input",
                got: x.len(),
                expected: stage.target.len(),
            });
        }

        self.pred = x.clone();
        self.target = stage.target.clone();

        let loss = (&self.pred - &self.target)
            .mapv(|e| e.powi(2))
            .mean()
            .unwrap_or_default();
        Ok((x.clone(), loss))
    }

    /// Seeds the backward sweep: the loss gradient with respect to the
    /// prediction scored by the latest forward pass.
    pub fn backward(&self) -> Array2<f32> {
        (&self.pred - &self.target) * (2.0 / self.pred.len() as f32)
    }
}

impl Default for MseLoss {
    fn default() -> Self {
        Self::new()
    }
}
