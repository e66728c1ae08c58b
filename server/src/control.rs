use common::{Command, ServerMessage};
use tracing::{debug, warn};

use crate::engine::{SimulationEngine, StopOutcome};

/// Procesa un frame de texto entrante y devuelve la respuesta directa para
/// quien lo mandó, si corresponde. Lo que la corrida emite (start, parámetros,
/// snapshots, marcadores) viaja por la telemetría, no por acá.
pub fn handle_text(engine: &SimulationEngine, text: &str) -> Option<ServerMessage> {
    let command = match Command::parse(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            warn!("comando rechazado: {}", err);
            return Some(ServerMessage::from(&err));
        }
    };

    debug!("comando recibido: {:?}", command);

    match command {
        Command::Start(overrides) => match engine.start(overrides) {
            Ok(_) => None,
            Err(err) => Some(ServerMessage::from(&err)),
        },
        Command::Stop => match engine.stop() {
            StopOutcome::Stopped(_) => None,
            // sin corrida no hay marcador; contestamos con el estado
            StopOutcome::WasIdle => Some(engine.status()),
        },
        Command::Status => Some(engine.status()),
    }
}
