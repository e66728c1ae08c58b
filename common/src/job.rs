use serde::{Deserialize, Serialize};

pub type JobId = u64;

/// Un trabajo de impresión. Lo crea el proceso de llegadas, vive en la cola
/// hasta que una impresora lo toma y se descarta al completarse.
/// Todos los tiempos son milisegundos simulados desde el inicio de la corrida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,

    /// Páginas a imprimir; es también el papel que consume de la bandeja.
    pub papers: u32,

    pub created_at_ms: u64,
    pub enqueued_at_ms: Option<u64>,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
}

impl Job {
    pub fn new(id: JobId, papers: u32, created_at_ms: u64) -> Self {
        Self {
            id,
            papers,
            created_at_ms,
            enqueued_at_ms: None,
            started_at_ms: None,
            completed_at_ms: None,
        }
    }

    /// Tiempo que pasó en cola antes de empezar a imprimirse.
    pub fn queue_wait_ms(&self) -> Option<u64> {
        let enq = self.enqueued_at_ms?;
        let start = self.started_at_ms?;
        Some(start.saturating_sub(enq))
    }

    /// Tiempo total en el sistema (llegada → fin de impresión).
    pub fn system_time_ms(&self) -> Option<u64> {
        self.completed_at_ms
            .map(|done| done.saturating_sub(self.created_at_ms))
    }

    pub fn service_time_ms(&self) -> Option<u64> {
        let start = self.started_at_ms?;
        let done = self.completed_at_ms?;
        Some(done.saturating_sub(start))
    }
}
