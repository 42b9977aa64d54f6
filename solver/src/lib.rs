pub mod callback;
pub mod error;
pub mod net;
pub mod solver;
pub mod stats;

pub use callback::Callback;
pub use error::{Result, SolverErr};
pub use net::Net;
pub use solver::{LayerProbe, StepSolver};
pub use stats::SolverStats;
