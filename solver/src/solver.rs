use std::{fmt, num::NonZeroUsize};

use log::{debug, trace};

use crate::{Callback, Net, Result, SolverErr, SolverStats};

/// Diagnostic closure attached to a single layer. Runs with a shared view of
/// the network right after that layer's backward compute.
pub type LayerProbe<N> = Box<dyn FnMut(&N) + Send>;

/// Drives a [`Net`] through forward/backward passes one layer at a time,
/// accumulating gradients over `iter_size` sub-iterations per optimizer step
/// and notifying registered [`Callback`]s at layer boundaries.
///
/// The forward phase visits layers `0..L` in order, the backward phase
/// `L-1..=0`. Ordering between compute and hooks is the contract documented
/// on [`Callback`]; the solver itself is single-threaded and never reorders,
/// coalesces or parallelizes those calls.
pub struct StepSolver<N> {
    net: N,
    iter_size: NonZeroUsize,
    callbacks: Vec<Box<dyn Callback>>,
    probes: Vec<(usize, LayerProbe<N>)>,
    stats: SolverStats,
}

impl<N: Net> StepSolver<N> {
    /// Creates a solver over `net` that accumulates gradients across
    /// `iter_size` forward/backward passes per call to [`step`](Self::step).
    pub fn new(net: N, iter_size: NonZeroUsize) -> Self {
        let layers = net.num_layers();
        let params: usize = (0..layers).map(|i| net.layer_param_ids(i).len()).sum();
        debug!(layers = layers, params = params, iter_size = iter_size.get(); "solver ready");

        Self {
            net,
            iter_size,
            callbacks: Vec::new(),
            probes: Vec::new(),
            stats: SolverStats::default(),
        }
    }

    /// Registers an observer. Observers are notified in registration order.
    pub fn register(&mut self, callback: Box<dyn Callback>) {
        self.callbacks.push(callback);
    }

    /// Attaches a diagnostic probe to `layer`. The probe runs on every
    /// sub-iteration, right after the layer's backward compute and before any
    /// `on_gradients_ready` notification. Probes on the same layer run in
    /// attachment order.
    ///
    /// # Errors
    /// Returns `SolverErr::LayerOutOfBounds` if `layer` is not in the network.
    pub fn add_layer_probe(&mut self, layer: usize, probe: LayerProbe<N>) -> Result<()> {
        let layers = self.net.num_layers();
        if layer >= layers {
            return Err(SolverErr::LayerOutOfBounds { layer, layers });
        }
        self.probes.push((layer, probe));
        Ok(())
    }

    /// Runs one accumulation cycle: zeroes the network's gradients, executes
    /// `iter_size` forward/backward passes and returns the mean loss across
    /// them.
    ///
    /// # Errors
    /// The first failing layer or observer hook aborts the cycle and its
    /// error is returned. Gradients are left as accumulated so far.
    pub fn step(&mut self) -> Result<f32> {
        let iter_size = self.iter_size.get();
        debug!(step = self.stats.steps; "cycle start");

        self.net.zero_grads();

        let mut loss = 0.0;
        for i in 0..iter_size {
            loss += self.forward_backward(i == 0, i + 1 == iter_size)?;
            self.stats.bump_pass();
        }

        let mean = loss / iter_size as f32;
        self.stats.bump_step();
        debug!(step = self.stats.steps, loss = mean; "cycle complete");
        Ok(mean)
    }

    /// Runs a single forward/backward pass over every layer and returns the
    /// loss it produced.
    ///
    /// `first` and `last` say where the pass sits inside an accumulation
    /// cycle: the before-hooks (`on_start`, `on_backward_start`) fire only
    /// when `first`, the after-hooks (`on_forward_finished`,
    /// `on_gradients_ready`) only when `last`. A standalone pass is both.
    ///
    /// # Errors
    /// Propagates the first failure from the network or an observer hook.
    pub fn forward_backward(&mut self, first: bool, last: bool) -> Result<f32> {
        let layers = self.net.num_layers();
        trace!(layers = layers, first = first, last = last; "pass start");

        let mut loss = 0.0;
        for i in 0..layers {
            if first {
                for cb in &mut self.callbacks {
                    cb.on_start(i)?;
                }
            }

            loss += self.net.forward_layer(i)?;

            if last {
                for cb in &mut self.callbacks {
                    cb.on_forward_finished(i)?;
                }
            }
        }

        for i in (0..layers).rev() {
            if first {
                for cb in &mut self.callbacks {
                    cb.on_backward_start(i)?;
                }
            }

            self.net.backward_layer(i)?;

            for (layer, probe) in &mut self.probes {
                if *layer == i {
                    probe(&self.net);
                }
            }

            if last {
                for cb in &mut self.callbacks {
                    cb.on_gradients_ready(i)?;
                }
            }
        }

        Ok(loss)
    }

    /// Number of sub-iterations per accumulation cycle.
    pub fn iter_size(&self) -> usize {
        self.iter_size.get()
    }

    /// Run counters accumulated so far.
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn net_mut(&mut self) -> &mut N {
        &mut self.net
    }

    /// Consumes the solver and hands the network back.
    pub fn into_net(self) -> N {
        self.net
    }
}

impl<N> fmt::Debug for StepSolver<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSolver")
            .field("iter_size", &self.iter_size)
            .field("callbacks", &self.callbacks.len())
            .field("probes", &self.probes.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
