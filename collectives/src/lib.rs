pub mod error;
pub mod hooks;
pub mod hub;
pub mod replica;
pub mod segment;

pub use error::{Result, SyncErr};
pub use hooks::{BroadcastHook, ReduceHook};
pub use hub::ParamHub;
pub use replica::train_replicas;
pub use segment::{Segment, SharedSegment};
