// server/src/state.rs

use common::SimConfig;

use crate::engine::SimulationEngine;
use crate::settings::Settings;
use crate::telemetry::Telemetry;

#[derive(Clone)]
pub struct AppState {
    pub engine: SimulationEngine,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let telemetry = Telemetry::new(settings.telemetry_capacity);
        Self {
            engine: SimulationEngine::new(
                SimConfig::default(),
                settings.engine.clone(),
                telemetry,
            ),
        }
    }
}
