use crate::Result;

/// Observer notified at layer boundaries while the solver runs a pass.
///
/// Implementations encapsulate everything that happens *around* the compute:
/// parameter distribution, gradient collection, bookkeeping. The solver treats
/// this trait as a black box and only guarantees *when* each hook fires:
///
/// - `on_start` / `on_forward_finished` bracket a layer's forward compute,
/// - `on_backward_start` / `on_gradients_ready` bracket its backward compute,
/// - within one call, hooks fire in registration order.
///
/// The "before" hooks fire only on the first sub-iteration of an accumulation
/// cycle, the "after" hooks only on the last, so observers see each layer at
/// most once per cycle and gradients only once they are fully accumulated.
///
/// Every hook defaults to a no-op, so implementations override only the
/// boundaries they care about.
pub trait Callback: Send {
    /// Fires before layer `layer` runs forward, first sub-iteration only.
    /// The layer's parameters must be ready when this returns.
    ///
    /// # Errors
    /// A failure aborts the pass and propagates to the solver's caller.
    fn on_start(&mut self, _layer: usize) -> Result<()> {
        Ok(())
    }

    /// Fires after layer `layer` ran forward, last sub-iteration only.
    ///
    /// # Errors
    /// A failure aborts the pass and propagates to the solver's caller.
    fn on_forward_finished(&mut self, _layer: usize) -> Result<()> {
        Ok(())
    }

    /// Fires before layer `layer` runs backward, first sub-iteration only.
    ///
    /// # Errors
    /// A failure aborts the pass and propagates to the solver's caller.
    fn on_backward_start(&mut self, _layer: usize) -> Result<()> {
        Ok(())
    }

    /// Fires after layer `layer` ran backward, last sub-iteration only. The
    /// layer's gradients are fully accumulated for the cycle at this point.
    ///
    /// # Errors
    /// A failure aborts the pass and propagates to the solver's caller.
    fn on_gradients_ready(&mut self, _layer: usize) -> Result<()> {
        Ok(())
    }
}
