use std::num::NonZeroUsize;

use collectives::Segment;
use mlp::{Act, Layer, SeqNet, Sgd};
use ndarray::{Array2, array};
use solver::{SolverErr, StepSolver};

fn xor_data() -> (Array2<f32>, Array2<f32>) {
    (
        array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]],
        array![[0.0], [1.0], [1.0], [0.0]],
    )
}

fn xor_net(batch: usize, seed: u64) -> SeqNet {
    let (x, y) = xor_data();
    let layers = vec![
        Layer::input(x, y, NonZeroUsize::new(batch).unwrap()).unwrap(),
        Layer::dense((2, 2), Some(Act::sigmoid(1.0))),
        Layer::dense((2, 1), None),
        Layer::mse(),
    ];
    SeqNet::new(layers, seed).unwrap()
}

/// One optimization cycle: accumulate gradients, then descend every segment.
fn train_step(solver: &mut StepSolver<SeqNet>, sgd: &Sgd) -> f32 {
    let loss = solver.step().unwrap();
    for segment in solver.net().segments() {
        let mut guard = segment.lock();
        let Segment { params, grads } = &mut *guard;
        sgd.update_params(&mut params[..], &grads[..]);
    }
    loss
}

#[test]
fn fitting_a_line_recovers_slope_and_intercept() {
    // y = 2x + 1, an objective plain gradient descent nails exactly.
    let x = array![[0.0], [1.0], [2.0], [3.0]];
    let y = array![[1.0], [3.0], [5.0], [7.0]];
    let layers = vec![
        Layer::input(x, y, NonZeroUsize::new(4).unwrap()).unwrap(),
        Layer::dense((1, 1), None),
        Layer::mse(),
    ];
    let net = SeqNet::new(layers, 11).unwrap();
    let mut solver = StepSolver::new(net, NonZeroUsize::new(1).unwrap());
    let sgd = Sgd::new(0.05);

    let mut loss = f32::MAX;
    for _ in 0..5000 {
        loss = train_step(&mut solver, &sgd);
    }

    assert!(loss < 1e-6, "loss stuck at {loss}");
    let params = solver.net().segments()[1].lock().params.to_vec();
    assert!((params[0] - 2.0).abs() < 1e-2, "slope came out {}", params[0]);
    assert!((params[1] - 1.0).abs() < 1e-2, "intercept came out {}", params[1]);
}

#[test]
fn xor_loss_descends_under_training() {
    let net = xor_net(4, 3);
    let mut solver = StepSolver::new(net, NonZeroUsize::new(1).unwrap());
    let sgd = Sgd::new(0.3);

    let losses: Vec<f32> = (0..800).map(|_| train_step(&mut solver, &sgd)).collect();

    assert!(losses.iter().all(|l| l.is_finite()));
    let first: f32 = losses[..10].iter().sum::<f32>() / 10.0;
    let last: f32 = losses[losses.len() - 10..].iter().sum::<f32>() / 10.0;
    assert!(last < first * 0.95, "no descent: {first} -> {last}");
}

#[test]
fn accumulated_micro_batches_match_one_full_batch() {
    // Two sub-iterations over half the rows each must accumulate exactly
    // twice the gradient one full-batch pass produces, because the loss
    // normalizes by batch size.
    let mut micro = StepSolver::new(xor_net(2, 7), NonZeroUsize::new(2).unwrap());
    let mut full = StepSolver::new(xor_net(4, 7), NonZeroUsize::new(1).unwrap());

    micro.step().unwrap();
    full.step().unwrap();

    for layer in [1, 2] {
        let accumulated = micro.net().segments()[layer].lock().grads.to_vec();
        let reference = full.net().segments()[layer].lock().grads.to_vec();
        for (a, b) in accumulated.iter().zip(&reference) {
            assert!((a - 2.0 * b).abs() < 1e-5, "grad drift: {a} vs 2 * {b}");
        }
    }
}

#[test]
fn step_activation_cannot_backpropagate() {
    let (x, y) = xor_data();
    let layers = vec![
        Layer::input(x, y, NonZeroUsize::new(4).unwrap()).unwrap(),
        Layer::dense((2, 1), Some(Act::step(1.0, 0.0, 0.5))),
        Layer::mse(),
    ];
    let net = SeqNet::new(layers, 0).unwrap();
    let mut solver = StepSolver::new(net, NonZeroUsize::new(1).unwrap());

    let err = solver.step().unwrap_err();

    assert!(matches!(err, SolverErr::Unsupported { layer: 1, .. }));
}
