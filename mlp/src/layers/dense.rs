use ndarray::{linalg, prelude::*};
use solver::{Result, SolverErr};

use crate::Act;

/// Fully connected layer, optionally topped with an activation.
///
/// Parameters live in a flat external slice laid out as the row-major weight
/// matrix followed by the biases. The gradient methods add into their buffer
/// so contributions accumulate across the passes of one cycle.
///
/// Optimizations:
///   1. Find a way to not copy `x` in each `Dense::forward` call.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act: Option<Act>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    pub fn new(dim: (usize, usize), act: Option<Act>) -> Self {
        let empty = Array2::zeros((0, 0));

        Self {
            dim,
            act,
            size: (dim.0 + 1) * dim.1,
            x: empty.clone(),
            z: empty,
        }
    }

    /// The amount of parameters this layer has: weights plus biases.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Computes `act(x · w + b)` and caches what the backward pass needs.
    ///
    /// # Errors
    /// Returns `SolverErr::ShapeMismatch` if `x` or `params` has the wrong
    /// width for this layer.
    pub fn forward(
        &mut self,
        layer: usize,
        params: &[f32],
        x: &Array2<f32>,
    ) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(SolverErr::ShapeMismatch {
                what: "dense input width",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }
        let (w, b) = self.view_params(params)?;

        self.z = x.dot(&w) + &b;
        self.x = x.clone();

        let out = match &self.act {
            Some(act) => self.z.mapv(|z| act.f(z)),
            None => self.z.clone(),
        };
        Ok(out)
    }

    /// Adds this layer's parameter gradients into `grads` given `d`, the loss
    /// gradient with respect to the layer output, and returns the loss
    /// gradient with respect to the layer input.
    ///
    /// # Errors
    /// Returns `SolverErr::Unsupported` if the activation has no gradient and
    /// `SolverErr::ShapeMismatch` on a buffer or dimension violation.
    pub fn backward(
        &mut self,
        layer: usize,
        params: &[f32],
        grads: &mut [f32],
        d: &Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != (self.x.nrows(), self.dim.1) {
            return Err(SolverErr::ShapeMismatch {
                what: "delta shape",
                got: d.len(),
                expected: self.x.nrows() * self.dim.1,
            });
        }

        let mut d = d.clone();
        if let Some(act) = &self.act {
            let mut differentiable = true;
            d.zip_mut_with(&self.z, |d, &z| match act.df(z) {
                Some(df) => *d *= df,
                None => differentiable = false,
            });
            if !differentiable {
                return Err(SolverErr::Unsupported {
                    layer,
                    what: "activation has no gradient",
                });
            }
        }

        let (mut dw, mut db) = self.view_grads(grads)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    /// Views the raw parameter slice as this layer's weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        let got = params.len();
        let bad = || SolverErr::ShapeMismatch {
            what: "dense params",
            got,
            expected: self.size,
        };
        if got != self.size {
            return Err(bad());
        }

        let w_size = self.size - self.dim.1;
        let w = ArrayView2::from_shape(self.dim, &params[..w_size]).map_err(|_| bad())?;
        let b = ArrayView1::from_shape(self.dim.1, &params[w_size..]).map_err(|_| bad())?;
        Ok((w, b))
    }

    /// Views the raw gradient slice as this layer's weight and bias deltas.
    fn view_grads<'a>(
        &self,
        grads: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let got = grads.len();
        let bad = || SolverErr::ShapeMismatch {
            what: "dense grads",
            got,
            expected: self.size,
        };
        if got != self.size {
            return Err(bad());
        }

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grads.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| bad())?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).map_err(|_| bad())?;
        Ok((dw, db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_applies_weights_biases_and_activation() {
        let mut dense = Dense::new((2, 1), None);
        // w = [[2], [3]], b = [1]
        let params = [2.0, 3.0, 1.0];
        let x = array![[1.0, 1.0], [0.0, 2.0]];

        let out = dense.forward(0, &params, &x).unwrap();

        assert_eq!(out, array![[6.0], [7.0]]);
    }

    #[test]
    fn backward_accumulates_across_calls() {
        let mut dense = Dense::new((2, 1), None);
        let params = [2.0, 3.0, 1.0];
        let x = array![[1.0, 2.0]];
        let d = array![[1.0]];
        let mut grads = [0.0; 3];

        dense.forward(0, &params, &x).unwrap();
        let dx = dense.backward(0, &params, &mut grads, &d).unwrap();
        assert_eq!(grads, [1.0, 2.0, 1.0], "dw = x^T d, db = sum of d rows");
        assert_eq!(dx, array![[2.0, 3.0]], "dx = d w^T");

        // A second pass doubles every slot instead of overwriting.
        dense.forward(0, &params, &x).unwrap();
        dense.backward(0, &params, &mut grads, &d).unwrap();
        assert_eq!(grads, [2.0, 4.0, 2.0]);
    }

    #[test]
    fn sigmoid_gradient_scales_the_delta() {
        let mut dense = Dense::new((1, 1), Some(Act::sigmoid(1.0)));
        // w = [[1]], b = [0] so z = x
        let params = [1.0, 0.0];
        let x = array![[0.0]];
        let d = array![[4.0]];
        let mut grads = [0.0; 2];

        dense.forward(0, &params, &x).unwrap();
        dense.backward(0, &params, &mut grads, &d).unwrap();

        // df(0) = 0.25, so the delta entering the products is 1.0.
        assert_eq!(grads, [0.0, 1.0]);
    }

    #[test]
    fn step_activation_cannot_run_backward() {
        let mut dense = Dense::new((1, 1), Some(Act::step(1.0, 0.0, 0.5)));
        let params = [1.0, 0.0];
        let mut grads = [0.0; 2];

        dense.forward(3, &params, &array![[1.0]]).unwrap();
        let err = dense
            .backward(3, &params, &mut grads, &array![[1.0]])
            .unwrap_err();

        assert!(matches!(err, SolverErr::Unsupported { layer: 3, .. }));
    }

    #[test]
    fn wrong_widths_are_rejected() {
        let mut dense = Dense::new((2, 2), None);
        let params = [0.0; 6];

        let err = dense.forward(0, &params, &array![[1.0]]).unwrap_err();

        assert!(matches!(
            err,
            SolverErr::ShapeMismatch {
                what: "dense input width",
                got: 1,
                expected: 2,
            }
        ));
    }
}
