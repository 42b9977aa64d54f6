use log::trace;
use solver::{Callback, SolverErr};

use crate::{ParamHub, SharedSegment, SyncErr};

fn hook_err(hook: &'static str, layer: usize, e: SyncErr) -> SolverErr {
    SolverErr::Hook {
        hook,
        layer,
        detail: e.to_string(),
    }
}

/// Installs the hub's published parameters into a replica's segments at the
/// start of every accumulation cycle, before any layer runs forward.
///
/// The hook tracks which cycle the solver is on by itself: each `on_start`
/// sweep over the layers is one cycle, and cycle `c` pulls parameter
/// generation `c`. Blocking on the pull is what paces a replica to the rest
/// of the group.
pub struct BroadcastHook {
    hub: ParamHub,
    segments: Vec<SharedSegment>,
    buf: Vec<f32>,
    cycle: u64,
}

impl BroadcastHook {
    pub fn new(hub: ParamHub, segments: Vec<SharedSegment>) -> Self {
        Self {
            hub,
            segments,
            buf: Vec::new(),
            cycle: 0,
        }
    }
}

impl Callback for BroadcastHook {
    fn on_start(&mut self, layer: usize) -> solver::Result<()> {
        let Some(segment) = self.segments.get(layer) else {
            return Err(SolverErr::LayerOutOfBounds {
                layer,
                layers: self.segments.len(),
            });
        };

        let generation = self.cycle;
        if layer + 1 == self.segments.len() {
            self.cycle += 1;
        }

        let len = segment.lock().len();
        if len == 0 {
            return Ok(());
        }

        self.buf.resize(len, 0.);
        self.hub
            .pull_params(layer, &mut self.buf, generation)
            .map_err(|e| hook_err("on_start", layer, e))?;
        segment.lock().params.copy_from_slice(&self.buf);
        trace!(layer = layer, generation = generation; "params broadcast");
        Ok(())
    }
}

/// Pushes a replica's accumulated gradients to the hub as each layer's
/// backward work for the cycle completes.
pub struct ReduceHook {
    hub: ParamHub,
    segments: Vec<SharedSegment>,
    buf: Vec<f32>,
}

impl ReduceHook {
    pub fn new(hub: ParamHub, segments: Vec<SharedSegment>) -> Self {
        Self {
            hub,
            segments,
            buf: Vec::new(),
        }
    }
}

impl Callback for ReduceHook {
    fn on_gradients_ready(&mut self, layer: usize) -> solver::Result<()> {
        let Some(segment) = self.segments.get(layer) else {
            return Err(SolverErr::LayerOutOfBounds {
                layer,
                layers: self.segments.len(),
            });
        };

        {
            let segment = segment.lock();
            if segment.is_empty() {
                return Ok(());
            }
            self.buf.clear();
            self.buf.extend_from_slice(&segment.grads);
        }

        self.hub
            .push_grad(layer, &self.buf)
            .map_err(|e| hook_err("on_gradients_ready", layer, e))?;
        trace!(layer = layer; "gradients pushed");
        Ok(())
    }
}
