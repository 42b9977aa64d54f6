use std::num::NonZeroUsize;

use solver::{Callback, Net, Result, SolverErr, StepSolver};

/// Net with a scripted per-pass loss schedule and optional injected failures.
struct ScriptedNet {
    layers: usize,
    pass_losses: Vec<f32>,
    passes_seen: usize,
    forward_calls: Vec<usize>,
    backward_calls: Vec<usize>,
    zeroed: usize,
    fail_forward: Option<usize>,
    fail_backward: Option<usize>,
}

impl ScriptedNet {
    fn new(layers: usize, pass_losses: &[f32]) -> Self {
        Self {
            layers,
            pass_losses: pass_losses.to_vec(),
            passes_seen: 0,
            forward_calls: vec![0; layers],
            backward_calls: vec![0; layers],
            zeroed: 0,
            fail_forward: None,
            fail_backward: None,
        }
    }
}

impl Net for ScriptedNet {
    fn num_layers(&self) -> usize {
        self.layers
    }

    fn forward_layer(&mut self, layer: usize) -> Result<f32> {
        if self.fail_forward == Some(layer) {
            return Err(SolverErr::Unsupported {
                layer,
                what: "forward pass not implemented",
            });
        }
        self.forward_calls[layer] += 1;

        // The top layer contributes the whole pass loss.
        if layer + 1 == self.layers {
            let loss = self.pass_losses[self.passes_seen % self.pass_losses.len()];
            self.passes_seen += 1;
            Ok(loss)
        } else {
            Ok(0.0)
        }
    }

    fn backward_layer(&mut self, layer: usize) -> Result<()> {
        if self.fail_backward == Some(layer) {
            return Err(SolverErr::Unsupported {
                layer,
                what: "backward pass not implemented",
            });
        }
        self.backward_calls[layer] += 1;
        Ok(())
    }

    fn layer_param_ids(&self, _layer: usize) -> &[usize] {
        &[]
    }

    fn zero_grads(&mut self) {
        self.zeroed += 1;
    }
}

fn iters(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[test]
fn step_returns_mean_loss_across_sub_iterations() {
    let net = ScriptedNet::new(2, &[1.5, 2.5, 5.0]);
    let mut solver = StepSolver::new(net, iters(3));

    let loss = solver.step().unwrap();

    assert!((loss - 3.0).abs() < 1e-6);
}

#[test]
fn each_step_averages_only_its_own_passes() {
    let net = ScriptedNet::new(3, &[2.0, 4.0]);
    let mut solver = StepSolver::new(net, iters(1));

    // The loss accumulator starts fresh every cycle.
    assert!((solver.step().unwrap() - 2.0).abs() < 1e-6);
    assert!((solver.step().unwrap() - 4.0).abs() < 1e-6);
}

#[test]
fn every_layer_runs_iter_size_times_per_step() {
    let net = ScriptedNet::new(4, &[0.0]);
    let mut solver = StepSolver::new(net, iters(3));

    solver.step().unwrap();
    solver.step().unwrap();

    assert_eq!(solver.net().forward_calls, vec![6, 6, 6, 6]);
    assert_eq!(solver.net().backward_calls, vec![6, 6, 6, 6]);
    assert_eq!(solver.net().zeroed, 2, "one gradient reset per cycle");
}

#[test]
fn forward_failure_aborts_the_cycle() {
    let mut net = ScriptedNet::new(3, &[0.0]);
    net.fail_forward = Some(1);
    let mut solver = StepSolver::new(net, iters(2));

    let err = solver.step().unwrap_err();

    assert!(matches!(err, SolverErr::Unsupported { layer: 1, .. }));
    assert_eq!(solver.net().forward_calls, vec![1, 0, 0]);
    assert_eq!(solver.net().backward_calls, vec![0, 0, 0]);
    assert_eq!(solver.stats().passes, 0, "the failed pass does not count");
}

#[test]
fn backward_failure_aborts_the_cycle() {
    let mut net = ScriptedNet::new(3, &[0.0]);
    net.fail_backward = Some(2);
    let mut solver = StepSolver::new(net, iters(1));

    let err = solver.step().unwrap_err();

    assert!(matches!(err, SolverErr::Unsupported { layer: 2, .. }));
    assert_eq!(solver.net().forward_calls, vec![1, 1, 1]);
    assert_eq!(solver.net().backward_calls, vec![0, 0, 0]);
}

#[test]
fn hook_failure_propagates_after_the_layer_computed() {
    /// Rejects gradients for one layer, accepts everything else.
    struct RejectingSink {
        at: usize,
    }

    impl Callback for RejectingSink {
        fn on_gradients_ready(&mut self, layer: usize) -> Result<()> {
            if layer == self.at {
                return Err(SolverErr::Hook {
                    hook: "on_gradients_ready",
                    layer,
                    detail: "sink rejected gradients".into(),
                });
            }
            Ok(())
        }
    }

    let net = ScriptedNet::new(2, &[0.0]);
    let mut solver = StepSolver::new(net, iters(1));
    solver.register(Box::new(RejectingSink { at: 1 }));

    let err = solver.step().unwrap_err();

    assert!(matches!(
        err,
        SolverErr::Hook {
            hook: "on_gradients_ready",
            layer: 1,
            ..
        }
    ));
    // Layer 1 computed before its sink hook fired; layer 0 never ran backward.
    assert_eq!(solver.net().backward_calls, vec![0, 1]);
}
