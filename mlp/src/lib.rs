pub mod act;
pub mod init;
pub mod layers;
mod net;
mod sgd;

pub use act::Act;
pub use layers::{Dense, Input, Layer, MseLoss, Stage};
pub use net::SeqNet;
pub use sgd::Sgd;
