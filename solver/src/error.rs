use std::{error::Error, fmt, io};

/// The solver module's result type.
pub type Result<T> = std::result::Result<T, SolverErr>;

/// Failures raised while driving a network through forward/backward passes.
#[derive(Debug)]
pub enum SolverErr {
    /// A layer was asked for a compute path it does not implement.
    Unsupported {
        layer: usize,
        what: &'static str,
    },
    /// A buffer did not have the length the operation required.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A layer index outside the network was addressed.
    LayerOutOfBounds {
        layer: usize,
        layers: usize,
    },
    /// The layer stack handed to a network constructor is not runnable.
    Topology {
        layer: usize,
        what: &'static str,
    },
    /// A registered observer failed inside one of its notification hooks.
    Hook {
        hook: &'static str,
        layer: usize,
        detail: String,
    },
}

impl fmt::Display for SolverErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverErr::Unsupported { layer, what } => {
                write!(f, "unsupported operation at layer {layer}: {what}")
            }
            SolverErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "{what} length mismatch: got {got}, expected {expected}"),
            SolverErr::LayerOutOfBounds { layer, layers } => {
                write!(f, "layer {layer} out of bounds for a {layers}-layer network")
            }
            SolverErr::Topology { layer, what } => {
                write!(f, "bad topology at layer {layer}: {what}")
            }
            SolverErr::Hook {
                hook,
                layer,
                detail,
            } => write!(f, "{hook} hook failed at layer {layer}: {detail}"),
        }
    }
}

impl Error for SolverErr {}

/// Boundary conversion for binaries / I/O APIs.
impl From<SolverErr> for io::Error {
    fn from(value: SolverErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, value)
    }
}
