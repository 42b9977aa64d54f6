use std::{num::NonZeroUsize, sync::Arc};

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use rayon::prelude::*;

use crate::{Result, SyncErr};

/// Master state for one layer.
#[derive(Debug)]
struct Slot {
    params: Box<[f32]>,
    accum: Box<[f32]>,
    pending: usize,
}

#[derive(Debug, Default)]
struct HubState {
    /// Number of parameter publications so far. The initial parameters count
    /// as generation 0.
    generation: u64,
    /// Slots whose gradient has contributions from every replica this cycle.
    full_slots: usize,
    closed: bool,
}

struct HubInner {
    slots: Vec<Mutex<Slot>>,
    state: Mutex<HubState>,
    published: Condvar,
    reduced: Condvar,
    replicas: usize,
    /// Slots that actually carry parameters; empty ones never see pushes.
    active_slots: usize,
}

/// Per-layer master parameter store shared by all replicas of a network.
///
/// One cycle of the protocol, from the hub's point of view:
/// 1. every replica pulls the current generation's parameters per layer,
/// 2. every replica pushes one accumulated gradient per layer,
/// 3. once all pushes landed, one caller folds the replica-averaged
///    gradients into the parameters and publishes the next generation.
///
/// Cloning the hub clones a handle to the same shared store.
#[derive(Clone)]
pub struct ParamHub {
    inner: Arc<HubInner>,
}

impl ParamHub {
    /// Creates a hub for `replicas` replicas of a network whose layers own
    /// `sizes[i]` scalar parameters each. All parameters start zeroed.
    pub fn new(replicas: NonZeroUsize, sizes: &[usize]) -> Self {
        let slots: Vec<_> = sizes
            .iter()
            .map(|&len| {
                Mutex::new(Slot {
                    params: vec![0.; len].into_boxed_slice(),
                    accum: vec![0.; len].into_boxed_slice(),
                    pending: 0,
                })
            })
            .collect();
        let active_slots = sizes.iter().filter(|&&len| len > 0).count();
        let params: usize = sizes.iter().sum();
        debug!(
            layers = sizes.len(),
            params = params,
            replicas = replicas.get();
            "hub ready"
        );

        Self {
            inner: Arc::new(HubInner {
                slots,
                state: Mutex::new(HubState::default()),
                published: Condvar::new(),
                reduced: Condvar::new(),
                replicas: replicas.get(),
                active_slots,
            }),
        }
    }

    /// Number of layer slots.
    pub fn layers(&self) -> usize {
        self.inner.slots.len()
    }

    /// Number of replicas every reduction waits for.
    pub fn replicas(&self) -> usize {
        self.inner.replicas
    }

    /// Current parameter generation.
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    fn slot(&self, layer: usize) -> Result<&Mutex<Slot>> {
        self.inner.slots.get(layer).ok_or(SyncErr::LayerOutOfBounds {
            layer,
            layers: self.inner.slots.len(),
        })
    }

    /// Seeds layer `layer` with initial parameters. Intended to run before
    /// training starts; the seeded values belong to generation 0.
    ///
    /// # Errors
    /// Returns `SyncErr` on an unknown layer or a length mismatch.
    pub fn load_params(&self, layer: usize, params: &[f32]) -> Result<()> {
        let mut slot = self.slot(layer)?.lock();
        if params.len() != slot.params.len() {
            return Err(SyncErr::WeightsLengthMismatch {
                layer,
                got: params.len(),
                expected: slot.params.len(),
            });
        }
        slot.params.copy_from_slice(params);
        Ok(())
    }

    /// Copies layer `layer`'s parameters into `out` once generation
    /// `min_generation` (or newer) is published, blocking if necessary.
    ///
    /// # Errors
    /// Returns `SyncErr::Closed` if the hub shuts down before the requested
    /// generation exists, and `SyncErr` on bad layer or length.
    pub fn pull_params(&self, layer: usize, out: &mut [f32], min_generation: u64) -> Result<()> {
        let slot = self.slot(layer)?;
        let expected = slot.lock().params.len();
        if out.len() != expected {
            return Err(SyncErr::WeightsLengthMismatch {
                layer,
                got: out.len(),
                expected,
            });
        }
        if expected == 0 {
            return Ok(());
        }

        {
            let mut state = self.inner.state.lock();
            while state.generation < min_generation && !state.closed {
                self.inner.published.wait(&mut state);
            }
            if state.generation < min_generation {
                return Err(SyncErr::Closed);
            }
        }

        out.copy_from_slice(&slot.lock().params);
        Ok(())
    }

    /// Adds one replica's accumulated gradient for layer `layer` into the
    /// layer's reduction buffer. Each replica must push exactly once per
    /// layer per cycle.
    ///
    /// # Errors
    /// Returns `SyncErr` on an unknown layer or a length mismatch.
    pub fn push_grad(&self, layer: usize, grad: &[f32]) -> Result<()> {
        let slot = self.slot(layer)?;
        let filled = {
            let mut slot = slot.lock();
            if grad.len() != slot.accum.len() {
                return Err(SyncErr::GradientLengthMismatch {
                    layer,
                    got: grad.len(),
                    expected: slot.accum.len(),
                });
            }
            if slot.accum.is_empty() {
                return Ok(());
            }
            slot.accum.iter_mut().zip(grad).for_each(|(acc, g)| *acc += g);
            slot.pending += 1;
            slot.pending == self.inner.replicas
        };

        if filled {
            let mut state = self.inner.state.lock();
            state.full_slots += 1;
            trace!(layer = layer, full_slots = state.full_slots; "slot fully reduced");
            if state.full_slots == self.inner.active_slots {
                self.inner.reduced.notify_all();
            }
        }
        Ok(())
    }

    /// Blocks until every layer received a gradient from every replica for
    /// the current cycle.
    ///
    /// # Errors
    /// Returns `SyncErr::Closed` if the hub shuts down first.
    pub fn wait_reduced(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        while state.full_slots < self.inner.active_slots && !state.closed {
            self.inner.reduced.wait(&mut state);
        }
        if state.closed {
            return Err(SyncErr::Closed);
        }
        Ok(())
    }

    /// Folds the replica-averaged gradients into every layer's parameters via
    /// `update`, clears the reduction buffers and publishes the next
    /// generation. Call only after [`wait_reduced`](Self::wait_reduced)
    /// returned.
    ///
    /// `update` receives `(params, mean_grad)` per layer and runs for the
    /// layers in parallel.
    ///
    /// # Errors
    /// Returns `SyncErr::Closed` if the hub was shut down.
    pub fn apply_updates<U>(&self, update: U) -> Result<()>
    where
        U: Fn(&mut [f32], &[f32]) + Sync,
    {
        if self.inner.state.lock().closed {
            return Err(SyncErr::Closed);
        }

        let scale = 1.0 / self.inner.replicas as f32;
        self.inner.slots.par_iter().for_each(|slot| {
            let mut slot = slot.lock();
            if slot.accum.is_empty() {
                return;
            }
            let Slot {
                params,
                accum,
                pending,
            } = &mut *slot;
            accum.iter_mut().for_each(|g| *g *= scale);
            update(&mut params[..], &accum[..]);
            accum.fill(0.);
            *pending = 0;
        });

        let mut state = self.inner.state.lock();
        state.full_slots = 0;
        state.generation += 1;
        debug!(generation = state.generation; "parameters published");
        self.inner.published.notify_all();
        Ok(())
    }

    /// Copies layer `layer`'s current parameters into `out` without waiting
    /// for any generation.
    ///
    /// # Errors
    /// Returns `SyncErr` on an unknown layer or a length mismatch.
    pub fn read_params(&self, layer: usize, out: &mut [f32]) -> Result<()> {
        let slot = self.slot(layer)?.lock();
        if out.len() != slot.params.len() {
            return Err(SyncErr::WeightsLengthMismatch {
                layer,
                got: out.len(),
                expected: slot.params.len(),
            });
        }
        out.copy_from_slice(&slot.params);
        Ok(())
    }

    /// Shuts the hub down, waking every blocked caller with
    /// `SyncErr::Closed`. Idempotent.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if !state.closed {
            state.closed = true;
            debug!(generation = state.generation; "hub closed");
            self.inner.published.notify_all();
            self.inner.reduced.notify_all();
        }
    }
}
