pub mod arrivals;
pub mod control;
pub mod engine;
pub mod handlers;
pub mod settings;
pub mod state;
pub mod stats;
pub mod telemetry;

pub use engine::{Simulation, SimulationEngine, StopOutcome};
pub use handlers::build_router;
pub use settings::{EngineSettings, Settings};
pub use state::AppState;
