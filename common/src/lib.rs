pub mod config;
pub mod error;
pub mod job;
pub mod paper;
pub mod protocol;
pub mod queue;

pub use config::{config_ranges, ConfigOverrides, FieldRange, SimConfig};
pub use error::{SimError, SimResult};
pub use job::{Job, JobId};
pub use paper::PaperTray;
pub use protocol::{
    ClientEnvelope, Command, ConfigResponse, RunStatistics, RunStatus, ServerMessage, Snapshot,
    WorkerId,
};
pub use queue::{JobQueue, QueueEmpty, QueueFull};
