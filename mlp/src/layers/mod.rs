mod dense;
mod input;
mod layer;
mod mse;

use ndarray::Array2;

pub use dense::Dense;
pub use input::Input;
pub use layer::Layer;
pub use mse::MseLoss;

/// Values that travel between the edge layers outside the activation flow:
/// the input layer stages each micro-batch's targets here and the loss layer
/// consumes them during the same pass.
#[derive(Debug)]
pub struct Stage {
    pub target: Array2<f32>,
}

impl Stage {
    pub fn new() -> Self {
        Self {
            target: Array2::zeros((0, 0)),
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}
