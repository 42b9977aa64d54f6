use std::num::NonZeroUsize;

use ndarray::{Array2, Axis};
use solver::{Result, SolverErr};

/// Entry layer: owns the dataset and emits one micro-batch per forward pass,
/// cycling through the rows in order.
#[derive(Debug, Clone)]
pub struct Input {
    data_x: Array2<f32>,
    data_y: Array2<f32>,
    batch: NonZeroUsize,
    cursor: usize,
}

impl Input {
    /// Creates the layer over a dataset of `(features, targets)` rows.
    ///
    /// # Errors
    /// Returns `SolverErr::ShapeMismatch` if the two tables disagree on row
    /// count or the dataset is empty.
    pub fn new(data_x: Array2<f32>, data_y: Array2<f32>, batch: NonZeroUsize) -> Result<Self> {
        if data_x.nrows() != data_y.nrows() {
            return Err(SolverErr::ShapeMismatch {
                what: "dataset rows",
                got: data_y.nrows(),
                expected: data_x.nrows(),
            });
        }
        if data_x.nrows() == 0 {
            return Err(SolverErr::ShapeMismatch {
                what: "dataset rows",
                got: 0,
                expected: 1,
            });
        }

        Ok(Self {
            data_x,
            data_y,
            batch,
            cursor: 0,
        })
    }

    /// Width of one feature row.
    pub fn features(&self) -> usize {
        self.data_x.ncols()
    }

    /// Width of one target row.
    pub fn targets(&self) -> usize {
        self.data_y.ncols()
    }

    /// Emits the next micro-batch, wrapping around at the end of the data.
    pub(crate) fn next_batch(&mut self) -> (Array2<f32>, Array2<f32>) {
        let rows = self.data_x.nrows();
        let batch = self.batch.get();
        let idx: Vec<usize> = (0..batch).map(|k| (self.cursor + k) % rows).collect();
        self.cursor = (self.cursor + batch) % rows;

        (
            self.data_x.select(Axis(0), &idx),
            self.data_y.select(Axis(0), &idx),
        )
    }
}
