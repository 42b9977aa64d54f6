use std::sync::Arc;

use parking_lot::Mutex;

/// Replica-local storage for one layer: flat parameters plus the gradient
/// buffer backward passes accumulate into.
#[derive(Debug)]
pub struct Segment {
    pub params: Box<[f32]>,
    pub grads: Box<[f32]>,
}

/// A layer segment shared between its owning network and observer hooks.
pub type SharedSegment = Arc<Mutex<Segment>>;

impl Segment {
    /// Creates a zeroed segment holding `len` scalar parameters.
    pub fn new(len: usize) -> Self {
        Self {
            params: vec![0.; len].into_boxed_slice(),
            grads: vec![0.; len].into_boxed_slice(),
        }
    }

    /// Wraps a fresh segment for sharing between a network and its hooks.
    pub fn shared(len: usize) -> SharedSegment {
        Arc::new(Mutex::new(Self::new(len)))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn zero_grads(&mut self) {
        self.grads.fill(0.);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_grads_keeps_params() {
        let mut seg = Segment::new(3);
        seg.params.copy_from_slice(&[1., 2., 3.]);
        seg.grads.copy_from_slice(&[4., 5., 6.]);

        seg.zero_grads();

        assert_eq!(*seg.params, [1., 2., 3.]);
        assert_eq!(*seg.grads, [0., 0., 0.]);
    }

    #[test]
    fn shared_handles_alias_one_buffer() {
        let seg = Segment::shared(2);
        let other = Arc::clone(&seg);

        seg.lock().params[0] = 7.0;

        assert_eq!(other.lock().params[0], 7.0);
    }
}
