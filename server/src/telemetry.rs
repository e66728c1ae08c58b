use common::ServerMessage;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Fan-out de telemetría hacia todos los observadores conectados.
/// Publicar nunca bloquea: un observador lento pierde los mensajes más viejos.
#[derive(Clone)]
pub struct Telemetry {
    tx: broadcast::Sender<ServerMessage>,
}

impl Telemetry {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Devuelve cuántos observadores lo recibieron (0 si no hay nadie).
    pub fn publish(&self, msg: ServerMessage) -> usize {
        match self.tx.send(msg) {
            Ok(n) => n,
            Err(_) => {
                debug!("mensaje de telemetría sin observadores");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }
}

/// Siguiente mensaje para un observador. Si se atrasó, se saltea lo perdido
/// y sigue; devuelve None sólo cuando el canal se cerró.
pub async fn next_message(rx: &mut broadcast::Receiver<ServerMessage>) -> Option<ServerMessage> {
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("observador atrasado: se descartaron {} mensajes", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
