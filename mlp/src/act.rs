/// Scalar activation applied element-wise on top of a dense layer.
#[derive(Debug, Clone, Copy)]
pub enum Act {
    Sigmoid { amp: f32 },
    Step { top: f32, bottom: f32, thresh: f32 },
}

impl Act {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid { amp }
    }

    pub fn step(top: f32, bottom: f32, thresh: f32) -> Self {
        Self::Step { top, bottom, thresh }
    }

    pub fn f(&self, z: f32) -> f32 {
        match self {
            Act::Sigmoid { amp } => amp / (1. + (-z).exp()),
            Act::Step { top, bottom, thresh } => {
                let s = 1. / (1. + (-z).exp());
                if s >= *thresh { *top } else { *bottom }
            }
        }
    }

    /// Derivative with respect to `z`, or `None` for activations that have
    /// no usable gradient (the step function is flat almost everywhere).
    pub fn df(&self, z: f32) -> Option<f32> {
        match self {
            Act::Sigmoid { amp } => Some((amp * (-z).exp()) / ((-z).exp() + 1.).powi(2)),
            Act::Step { .. } => None,
        }
    }
}
