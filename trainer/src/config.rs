use std::num::NonZeroUsize;

/// Immutable execution bounds for a training run.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    replicas: NonZeroUsize,
    cycles: usize,
    iter_size: NonZeroUsize,
    learning_rate: f32,
    seed: u64,
}

impl TrainConfig {
    /// Creates a new training configuration.
    ///
    /// # Args
    /// * `replicas` - Number of model replicas training concurrently.
    /// * `cycles` - Number of optimization cycles to run.
    /// * `iter_size` - Gradient-accumulation passes per cycle and replica.
    /// * `learning_rate` - Descent rate applied to the averaged gradients.
    /// * `seed` - Seed for the shared initial weights.
    ///
    /// # Returns
    /// A `TrainConfig` instance.
    pub fn new(
        replicas: NonZeroUsize,
        cycles: usize,
        iter_size: NonZeroUsize,
        learning_rate: f32,
        seed: u64,
    ) -> Self {
        Self {
            replicas,
            cycles,
            iter_size,
            learning_rate,
            seed,
        }
    }

    pub fn replicas(&self) -> NonZeroUsize {
        self.replicas
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn iter_size(&self) -> NonZeroUsize {
        self.iter_size
    }

    /// The descent rate already folded down by `iter_size`, so accumulated
    /// gradient sums descend like their per-pass mean.
    pub fn effective_rate(&self) -> f32 {
        self.learning_rate / self.iter_size.get() as f32
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}
