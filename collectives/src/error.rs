use std::{error::Error, fmt, io};

/// The collectives module's result type.
pub type Result<T> = std::result::Result<T, SyncErr>;

/// Synchronization failures between replicas and the hub.
#[derive(Debug)]
pub enum SyncErr {
    WeightsLengthMismatch {
        layer: usize,
        got: usize,
        expected: usize,
    },
    GradientLengthMismatch {
        layer: usize,
        got: usize,
        expected: usize,
    },
    LayerOutOfBounds {
        layer: usize,
        layers: usize,
    },
    /// The hub was shut down while the operation was in flight.
    Closed,
}

impl fmt::Display for SyncErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncErr::WeightsLengthMismatch {
                layer,
                got,
                expected,
            } => write!(
                f,
                "weights length mismatch at layer {layer}: got {got}, expected {expected}"
            ),
            SyncErr::GradientLengthMismatch {
                layer,
                got,
                expected,
            } => write!(
                f,
                "gradient length mismatch at layer {layer}: got {got}, expected {expected}"
            ),
            SyncErr::LayerOutOfBounds { layer, layers } => {
                write!(f, "layer {layer} out of bounds for a hub with {layers} slots")
            }
            SyncErr::Closed => write!(f, "parameter hub closed"),
        }
    }
}

impl Error for SyncErr {}

/// Boundary conversion for binaries / I/O APIs.
impl From<SyncErr> for io::Error {
    fn from(value: SyncErr) -> Self {
        match value {
            SyncErr::Closed => io::Error::new(io::ErrorKind::BrokenPipe, value),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
