/// Monotonic run counters for one solver instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SolverStats {
    /// Completed accumulation cycles.
    pub steps: u64,
    /// Completed forward/backward passes, summed over all cycles.
    pub passes: u64,
}

impl SolverStats {
    #[inline]
    pub fn bump_step(&mut self) {
        self.steps += 1;
    }

    #[inline]
    pub fn bump_pass(&mut self) {
        self.passes += 1;
    }
}
