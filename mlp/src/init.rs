use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::{distr::StandardUniform, rngs::StdRng};

/// Fills the weight part of a dense layer's flat parameter slice with
/// Xavier-uniform values in `[-sqrt(6 / (fan_in + fan_out)), +sqrt(..))`.
/// The trailing biases are left untouched.
pub fn xavier(params: &mut [f32], dim: (usize, usize), rng: &mut StdRng) {
    let (fan_in, fan_out) = dim;
    let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();

    let w: Array2<f32> = Array2::random_using((fan_in, fan_out), StandardUniform, rng)
        .mapv(|u: f32| (2.0 * u - 1.0) * bound);
    params
        .iter_mut()
        .zip(w.iter())
        .for_each(|(p, value)| *p = *value);
}
