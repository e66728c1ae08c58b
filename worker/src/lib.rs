pub mod autoscaler;
pub mod pool;
pub mod printer;

pub use autoscaler::{Autoscaler, ScalingContext, ScalingDecision};
pub use pool::{Retirement, WorkerPool};
pub use printer::{Worker, WorkerEvent, WorkerState};
