use collectives::{Segment, SharedSegment};
use log::debug;
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};
use solver::{Net, Result, SolverErr};

use crate::{
    init,
    layers::{Layer, Stage},
};

/// A sequential network: activations flow up through the layers on the
/// forward pass and deltas flow back down on the backward pass.
///
/// Parameters and gradients live in per-layer [`Segment`]s shared with
/// whoever synchronizes them; the network locks a layer's segment only for
/// the duration of that layer's compute.
#[derive(Debug)]
pub struct SeqNet {
    layers: Vec<Layer>,
    segments: Vec<SharedSegment>,
    param_ids: Vec<Vec<usize>>,
    flow: Vec<Array2<f32>>,
    delta: Vec<Option<Array2<f32>>>,
    stage: Stage,
}

impl SeqNet {
    /// Builds the network and draws every dense layer's initial weights
    /// Xavier-uniform from `seed`.
    ///
    /// # Errors
    /// Returns `SolverErr::Topology` or `SolverErr::ShapeMismatch` when the
    /// stack is not runnable: data must enter at the front, a scoring layer
    /// must sit at the top and layer widths must chain.
    pub fn new(layers: Vec<Layer>, seed: u64) -> Result<Self> {
        validate(&layers)?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut segments = Vec::with_capacity(layers.len());
        let mut param_ids = Vec::with_capacity(layers.len());
        let mut next_id = 0;
        for layer in &layers {
            let size = layer.size();
            let segment = Segment::shared(size);
            if let Layer::Dense(dense) = layer {
                init::xavier(&mut segment.lock().params, dense.dim(), &mut rng);
            }
            param_ids.push((next_id..next_id + size).collect());
            next_id += size;
            segments.push(segment);
        }
        debug!(layers = layers.len(), params = next_id; "network built");

        let n = layers.len();
        Ok(Self {
            layers,
            segments,
            param_ids,
            flow: vec![Array2::zeros((0, 0)); n],
            delta: vec![None; n],
            stage: Stage::new(),
        })
    }

    /// Per-layer parameter segments, shared with synchronization hooks.
    pub fn segments(&self) -> &[SharedSegment] {
        &self.segments
    }

    /// The amount of parameters each layer owns, in layer order.
    pub fn segment_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(Layer::size).collect()
    }

    pub fn num_params(&self) -> usize {
        self.layers.iter().map(Layer::size).sum()
    }

    /// Runs only the dense stack on `x`, bypassing the dataset and scoring
    /// layers.
    ///
    /// # Errors
    /// Returns `SolverErr::ShapeMismatch` if `x` does not fit the first
    /// dense layer.
    pub fn infer(&mut self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let mut cur = x.clone();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            if let Layer::Dense(dense) = layer {
                let guard = self.segments[i].lock();
                cur = dense.forward(i, &guard.params, &cur)?;
            }
        }
        Ok(cur)
    }
}

impl Net for SeqNet {
    fn num_layers(&self) -> usize {
        self.layers.len()
    }

    fn forward_layer(&mut self, layer: usize) -> Result<f32> {
        let layers = self.layers.len();
        if layer >= layers {
            return Err(SolverErr::LayerOutOfBounds { layer, layers });
        }

        let x = if layer == 0 {
            None
        } else {
            Some(&self.flow[layer - 1])
        };
        let guard = self.segments[layer].lock();
        let (out, loss) = self.layers[layer].forward(layer, &guard.params, x, &mut self.stage)?;
        drop(guard);

        self.flow[layer] = out;
        Ok(loss)
    }

    fn backward_layer(&mut self, layer: usize) -> Result<()> {
        let layers = self.layers.len();
        if layer >= layers {
            return Err(SolverErr::LayerOutOfBounds { layer, layers });
        }

        let d = self.delta[layer].as_ref();
        let mut guard = self.segments[layer].lock();
        let Segment { params, grads } = &mut *guard;
        let dx = self.layers[layer].backward(layer, &params[..], &mut grads[..], d)?;
        drop(guard);

        if layer > 0 {
            self.delta[layer - 1] = dx;
        }
        Ok(())
    }

    fn layer_param_ids(&self, layer: usize) -> &[usize] {
        self.param_ids.get(layer).map(Vec::as_slice).unwrap_or(&[])
    }

    fn zero_grads(&mut self) {
        for segment in &self.segments {
            segment.lock().zero_grads();
        }
    }
}

fn validate(layers: &[Layer]) -> Result<()> {
    let Some(Layer::Input(input)) = layers.first() else {
        return Err(SolverErr::Topology {
            layer: 0,
            what: "data must enter at the front",
        });
    };

    let mut width = input.features();
    for (i, layer) in layers.iter().enumerate().skip(1) {
        match layer {
            Layer::Input(_) => {
                return Err(SolverErr::Topology {
                    layer: i,
                    what: "data can only enter at the front",
                });
            }
            Layer::Dense(dense) => {
                if dense.dim().0 != width {
                    return Err(SolverErr::ShapeMismatch {
                        what: "dense input width",
                        got: dense.dim().0,
                        expected: width,
                    });
                }
                width = dense.dim().1;
            }
            Layer::MseLoss(_) => {
                if i + 1 != layers.len() {
                    return Err(SolverErr::Topology {
                        layer: i,
                        what: "the scoring layer must sit at the top",
                    });
                }
                if width != input.targets() {
                    return Err(SolverErr::ShapeMismatch {
                        what: "loss input width",
                        got: width,
                        expected: input.targets(),
                    });
                }
            }
        }
    }

    if !matches!(layers.last(), Some(Layer::MseLoss(_))) {
        return Err(SolverErr::Topology {
            layer: layers.len() - 1,
            what: "a scoring layer must sit at the top",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use ndarray::array;

    use super::*;
    use crate::Act;

    fn xor_data() -> (Array2<f32>, Array2<f32>) {
        (
            array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]],
            array![[0.0], [1.0], [1.0], [0.0]],
        )
    }

    fn xor_net(batch: usize) -> SeqNet {
        let (x, y) = xor_data();
        let layers = vec![
            Layer::input(x, y, NonZeroUsize::new(batch).unwrap()).unwrap(),
            Layer::dense((2, 2), Some(Act::sigmoid(1.0))),
            Layer::dense((2, 1), None),
            Layer::mse(),
        ];
        SeqNet::new(layers, 3).unwrap()
    }

    fn full_pass(net: &mut SeqNet) -> f32 {
        let mut loss = 0.0;
        for i in 0..net.num_layers() {
            loss += net.forward_layer(i).unwrap();
        }
        for i in (0..net.num_layers()).rev() {
            net.backward_layer(i).unwrap();
        }
        loss
    }

    #[test]
    fn stack_must_start_with_data() {
        let err = SeqNet::new(vec![Layer::dense((2, 1), None), Layer::mse()], 0).unwrap_err();

        assert!(matches!(err, SolverErr::Topology { layer: 0, .. }));
    }

    #[test]
    fn stack_must_end_with_a_scoring_layer() {
        let (x, y) = xor_data();
        let layers = vec![
            Layer::input(x, y, NonZeroUsize::new(4).unwrap()).unwrap(),
            Layer::dense((2, 1), None),
        ];

        let err = SeqNet::new(layers, 0).unwrap_err();

        assert!(matches!(err, SolverErr::Topology { layer: 1, .. }));
    }

    #[test]
    fn widths_must_chain() {
        let (x, y) = xor_data();
        let layers = vec![
            Layer::input(x, y, NonZeroUsize::new(4).unwrap()).unwrap(),
            Layer::dense((2, 3), None),
            Layer::dense((4, 1), None),
            Layer::mse(),
        ];

        let err = SeqNet::new(layers, 0).unwrap_err();

        assert!(matches!(
            err,
            SolverErr::ShapeMismatch {
                what: "dense input width",
                got: 4,
                expected: 3,
            }
        ));
    }

    #[test]
    fn param_ids_are_contiguous_across_layers() {
        let net = xor_net(4);

        assert_eq!(net.layer_param_ids(0), &[] as &[usize]);
        assert_eq!(net.layer_param_ids(1), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(net.layer_param_ids(2), &[6, 7, 8]);
        assert_eq!(net.layer_param_ids(3), &[] as &[usize]);
        assert_eq!(net.num_params(), 9);
        assert_eq!(net.segment_sizes(), vec![0, 6, 3, 0]);
    }

    #[test]
    fn gradients_accumulate_across_passes() {
        let mut net = xor_net(4);
        net.zero_grads();

        let loss = full_pass(&mut net);
        assert!(loss.is_finite() && loss > 0.0);

        let first: Vec<f32> = net.segments()[1].lock().grads.to_vec();
        assert!(first.iter().any(|g| *g != 0.0));

        // The batch covers the whole dataset, so a second pass sees the same
        // rows and must exactly double every gradient slot.
        full_pass(&mut net);
        let second: Vec<f32> = net.segments()[1].lock().grads.to_vec();
        for (a, b) in first.iter().zip(&second) {
            assert!((2.0 * a - b).abs() < 1e-6);
        }

        net.zero_grads();
        assert!(net.segments()[1].lock().grads.iter().all(|g| *g == 0.0));
    }

    #[test]
    fn infer_skips_dataset_and_scoring_layers() {
        let mut net = xor_net(4);

        let out = net.infer(&array![[0.0, 1.0], [1.0, 1.0]]).unwrap();

        assert_eq!(out.dim(), (2, 1));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn out_of_bounds_layers_are_reported() {
        let mut net = xor_net(4);

        let err = net.forward_layer(9).unwrap_err();

        assert!(matches!(
            err,
            SolverErr::LayerOutOfBounds { layer: 9, layers: 4 }
        ));
    }
}
