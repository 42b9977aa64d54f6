use std::thread;

use log::debug;
use solver::{Net, SolverErr, StepSolver};

use crate::ParamHub;

/// Runs `cycles` accumulation cycles on every replica solver concurrently,
/// folding the replica-averaged gradients into `hub`'s parameters through
/// `update` after each cycle.
///
/// Every solver must carry a [`BroadcastHook`](crate::BroadcastHook) and a
/// [`ReduceHook`](crate::ReduceHook) wired to `hub`; the hand-off between
/// cycles never completes otherwise. On success, returns the per-cycle mean
/// loss across replicas together with the solvers.
///
/// # Errors
/// Any replica failure closes the hub and unblocks the group; once every
/// replica wound down, the error of the lowest-indexed failed replica is
/// returned.
pub fn train_replicas<N, U>(
    hub: &ParamHub,
    solvers: Vec<StepSolver<N>>,
    cycles: usize,
    update: U,
) -> solver::Result<(Vec<f32>, Vec<StepSolver<N>>)>
where
    N: Net + Send,
    U: Fn(&mut [f32], &[f32]) + Sync,
{
    let replicas = solvers.len();
    if replicas != hub.replicas() {
        return Err(SolverErr::ShapeMismatch {
            what: "replica count",
            got: replicas,
            expected: hub.replicas(),
        });
    }
    debug!(replicas = replicas, cycles = cycles; "replica training start");

    let results = thread::scope(|scope| {
        let handles: Vec<_> = solvers
            .into_iter()
            .enumerate()
            .map(|(replica, mut solver)| {
                scope.spawn(move || {
                    let mut losses = Vec::with_capacity(cycles);
                    for cycle in 0..cycles {
                        match solver.step() {
                            Ok(loss) => {
                                debug!(replica = replica, cycle = cycle, loss = loss; "cycle done");
                                losses.push(loss);
                            }
                            Err(e) => {
                                hub.close();
                                return (solver, Err(e));
                            }
                        }
                    }
                    (solver, Ok(losses))
                })
            })
            .collect();

        // This thread is the update leader: one fold-and-publish per cycle.
        for _ in 0..cycles {
            if hub.wait_reduced().is_err() || hub.apply_updates(&update).is_err() {
                break;
            }
        }

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(out) => out,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<Vec<_>>()
    });

    let mut cycle_losses = Vec::with_capacity(replicas);
    let mut solvers = Vec::with_capacity(replicas);
    let mut first_err = None;
    for (solver, result) in results {
        solvers.push(solver);
        match result {
            Ok(losses) => cycle_losses.push(losses),
            Err(e) => first_err = first_err.or(Some(e)),
        }
    }
    if let Some(e) = first_err {
        return Err(e);
    }

    let means = (0..cycles)
        .map(|cycle| {
            cycle_losses.iter().map(|l| l[cycle]).sum::<f32>() / replicas as f32
        })
        .collect();
    Ok((means, solvers))
}
