use crate::Result;

/// A layered network that can be executed one layer at a time.
///
/// A `Net` exposes the per-layer compute seam the solver drives. It does not:
/// - decide pass ordering,
/// - apply parameter updates,
/// - notify observers.
pub trait Net {
    /// Returns the number of layers. Fixed for the lifetime of the network.
    fn num_layers(&self) -> usize;

    /// Computes the forward output of layer `layer` from the outputs of the
    /// layers below it, and returns the scalar loss this layer contributes
    /// (`0.0` for layers that contribute none).
    ///
    /// # Errors
    /// Returns `SolverErr` if the layer cannot run (unsupported path, shape
    /// violation, index out of bounds).
    fn forward_layer(&mut self, layer: usize) -> Result<f32>;

    /// Computes the backward pass of layer `layer` from the gradients of the
    /// layers above it.
    ///
    /// Implementations must add to their gradient buffers rather than
    /// overwrite them, so gradients accumulate across the sub-iterations of
    /// an accumulation cycle.
    ///
    /// # Errors
    /// Returns `SolverErr` if the layer cannot run backward.
    fn backward_layer(&mut self, layer: usize) -> Result<()>;

    /// Identifiers of the learnable parameter slots owned by layer `layer`.
    /// Empty for layers with nothing to learn.
    fn layer_param_ids(&self, layer: usize) -> &[usize];

    /// Zeroes every gradient buffer in the network.
    fn zero_grads(&mut self);
}
