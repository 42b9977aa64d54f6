mod config;

use std::{env, io, num::NonZeroUsize, str::FromStr};

use collectives::{BroadcastHook, ParamHub, ReduceHook, train_replicas};
use log::{info, trace};
use mlp::{Act, Layer, SeqNet, Sgd};
use ndarray::Array2;
use solver::StepSolver;

use crate::config::TrainConfig;

const DEFAULT_REPLICAS: NonZeroUsize = NonZeroUsize::new(2).unwrap();
const DEFAULT_STEPS: usize = 3000;
const DEFAULT_ITER_SIZE: NonZeroUsize = NonZeroUsize::MIN;
const DEFAULT_LR: f32 = 0.3;
const DEFAULT_SEED: u64 = 42;

fn main() -> io::Result<()> {
    env_logger::init();

    let config = config_from_env()?;
    info!(
        replicas = config.replicas().get(),
        cycles = config.cycles(),
        iter_size = config.iter_size().get();
        "training run start"
    );

    // Each sub-iteration sees a slice of the table; together they cover it.
    let rows = 4usize.div_ceil(config.iter_size().get());
    let batch = NonZeroUsize::new(rows).unwrap_or(NonZeroUsize::MIN);
    let nets: Vec<SeqNet> = (0..config.replicas().get())
        .map(|_| xor_net(batch, config.seed()))
        .collect::<io::Result<_>>()?;

    let sizes = nets[0].segment_sizes();
    let hub = ParamHub::new(config.replicas(), &sizes);
    for (layer, segment) in nets[0].segments().iter().enumerate() {
        hub.load_params(layer, &segment.lock().params)?;
    }

    let probe_layer = sizes.len() - 2;
    let mut solvers = Vec::with_capacity(nets.len());
    for net in nets {
        let segments = net.segments().to_vec();
        let mut solver = StepSolver::new(net, config.iter_size());
        solver.register(Box::new(BroadcastHook::new(hub.clone(), segments.clone())));
        solver.register(Box::new(ReduceHook::new(hub.clone(), segments)));
        solver.add_layer_probe(
            probe_layer,
            Box::new(move |net: &SeqNet| {
                let grads = &net.segments()[probe_layer].lock().grads;
                let norm = grads.iter().map(|g| g * g).sum::<f32>().sqrt();
                trace!(layer = probe_layer, norm = norm; "gradient probe");
            }),
        )?;
        solvers.push(solver);
    }

    let sgd = Sgd::new(config.effective_rate());
    let (losses, mut solvers) =
        train_replicas(&hub, solvers, config.cycles(), |w, g| sgd.update_params(w, g))?;
    for (cycle, loss) in losses.iter().enumerate() {
        if cycle % 500 == 0 || cycle + 1 == losses.len() {
            info!(cycle = cycle, loss = *loss; "mean replica loss");
        }
    }

    let Some(solver) = solvers.pop() else {
        return Ok(());
    };
    let mut net = solver.into_net();
    for (layer, segment) in net.segments().iter().enumerate() {
        hub.read_params(layer, &mut segment.lock().params)?;
    }

    let (x, y) = xor_table()?;
    let pred = net.infer(&x)?;
    for (row, want) in pred.rows().into_iter().zip(y.rows()) {
        info!(want = want[0], got = row[0]; "prediction");
    }
    info!("training done after generation {}", hub.generation());

    Ok(())
}

fn xor_table() -> io::Result<(Array2<f32>, Array2<f32>)> {
    let xs = vec![0., 0., 0., 1., 1., 0., 1., 1.];
    let ys = vec![0., 1., 1., 0.];

    let x = Array2::from_shape_vec((ys.len(), 2), xs).map_err(io::Error::other)?;
    let y = Array2::from_shape_vec((ys.len(), 1), ys).map_err(io::Error::other)?;
    Ok((x, y))
}

fn xor_net(batch: NonZeroUsize, seed: u64) -> io::Result<SeqNet> {
    let (x, y) = xor_table()?;
    let layers = vec![
        Layer::input(x, y, batch)?,
        Layer::dense((2, 4), Some(Act::sigmoid(1.0))),
        Layer::dense((4, 1), None),
        Layer::mse(),
    ];
    Ok(SeqNet::new(layers, seed)?)
}

fn env_or<T: FromStr>(key: &str, default: T) -> io::Result<T>
where
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(io::Error::other),
        Err(_) => Ok(default),
    }
}

fn config_from_env() -> io::Result<TrainConfig> {
    Ok(TrainConfig::new(
        env_or("REPLICAS", DEFAULT_REPLICAS)?,
        env_or("STEPS", DEFAULT_STEPS)?,
        env_or("ITER_SIZE", DEFAULT_ITER_SIZE)?,
        env_or("LR", DEFAULT_LR)?,
        env_or("SEED", DEFAULT_SEED)?,
    ))
}
