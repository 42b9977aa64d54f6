/// Plain stochastic gradient descent over flat parameter slices.
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    learning_rate: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }

    /// Applies one descent step: `w -= lr * g` slot by slot.
    pub fn update_params(&self, params: &mut [f32], grad: &[f32]) {
        params
            .iter_mut()
            .zip(grad)
            .for_each(|(w, g)| *w -= self.learning_rate * g);
    }
}
