use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{config_ranges, ConfigOverrides, FieldRange, SimConfig};
use crate::error::{SimError, SimResult};
use crate::job::JobId;

pub type WorkerId = u32;

/* --------- Mensajes entrantes (cliente → servidor) --------- */

/// Sobre JSON de un comando: `{"command": "...", "config": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigOverrides>,
}

impl ClientEnvelope {
    pub fn start(config: ConfigOverrides) -> Self {
        Self {
            command: "start".into(),
            config: (!config.is_empty()).then_some(config),
        }
    }

    pub fn bare(command: &str) -> Self {
        Self {
            command: command.into(),
            config: None,
        }
    }
}

/// Comando ya validado.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start(ConfigOverrides),
    Stop,
    Status,
}

impl Command {
    /// Decodifica un frame de texto. Acepta el sobre JSON y, por compatibilidad,
    /// los comandos sueltos `start` / `stop` / `status` en texto plano.
    pub fn parse(text: &str) -> SimResult<Command> {
        let trimmed = text.trim();
        match trimmed {
            "start" => return Ok(Command::Start(ConfigOverrides::default())),
            "stop" => return Ok(Command::Stop),
            "status" => return Ok(Command::Status),
            _ => {}
        }

        let envelope: ClientEnvelope = serde_json::from_str(trimmed)
            .map_err(|e| SimError::protocol(format!("payload inválido: {e}")))?;

        Command::try_from(envelope)
    }
}

impl TryFrom<ClientEnvelope> for Command {
    type Error = SimError;

    fn try_from(env: ClientEnvelope) -> SimResult<Command> {
        match env.command.as_str() {
            "start" => Ok(Command::Start(env.config.unwrap_or_default())),
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            other => Err(SimError::protocol(format!("unknown command: {other}"))),
        }
    }
}

/* --------- Estado de corrida y snapshots --------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
}

/// Foto periódica del progreso de la corrida.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sim_time_ms: u64,
    pub queue_depth: usize,
    pub resource_level: f64,
    pub worker_count: usize,
    pub busy_workers: usize,
    pub arrived: u64,
    pub completed: u64,
    pub dropped: u64,
}

/// Llegada de un trabajo al sistema, antes de intentar encolarlo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobArrivedEvent {
    pub job_id: JobId,
    pub papers: u32,
    pub arrived_at_ms: u64,
    /// Tiempo desde la llegada anterior (o desde el inicio, para la primera).
    pub inter_arrival_ms: u64,
    /// Profundidad de la cola que encontró al llegar.
    pub queue_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDroppedEvent {
    pub job_id: JobId,
    pub papers: u32,
    pub queue_depth: usize,
}

/// Una impresora sacó el trabajo de la cola y lo tiene en mano.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartedEvent {
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub papers: u32,
    /// Tiempo en cola hasta que la impresora lo tomó.
    pub waited_ms: u64,
    pub queue_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletedEvent {
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub papers: u32,
    pub system_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperEmptyEvent {
    pub worker_id: WorkerId,
    pub job_id: JobId,
    pub needed: u32,
    pub available: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleEvent {
    pub direction: ScaleDirection,
    pub worker_count: usize,
    pub queue_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRetiredEvent {
    pub worker_id: WorkerId,
    /// Impresoras que quedan en servicio.
    pub worker_count: usize,
}

/// Trabajo descartado por un stop. Sin `workerId` estaba en la cola.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRemovedEvent {
    pub job_id: JobId,
    pub papers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
}

/// Cifras de una impresora al cierre de la corrida.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatistics {
    pub worker_id: WorkerId,
    pub jobs_printed: u64,
    pub papers_printed: u64,
    pub busy_ms: u64,
}

/// Resumen de la corrida que se emite antes del marcador final.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub arrived: u64,
    pub completed: u64,
    pub dropped: u64,
    /// Trabajos abandonados por un stop (en cola o en impresión).
    pub removed: u64,
    pub peak_queue_depth: usize,
    pub avg_queue_depth: f64,
    pub avg_inter_arrival_ms: f64,
    pub avg_queue_wait_ms: f64,
    pub avg_system_time_ms: f64,
    pub std_system_time_ms: f64,
    pub avg_service_time_ms: f64,
    pub paper_used: u64,
    pub paper_refilled: f64,
    pub paper_stalls: u64,
    pub peak_workers: usize,
    pub duration_ms: u64,
    pub workers: Vec<WorkerStatistics>,
}

/* --------- Mensajes salientes (servidor → observadores) --------- */

/// Todos los mensajes que salen por el socket, discriminados por `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status {
        status: RunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Snapshot>,
    },
    SimulationStart,
    SimulationParameters {
        data: SimConfig,
    },
    StatsUpdate {
        data: Snapshot,
    },
    JobArrived {
        data: JobArrivedEvent,
    },
    JobDropped {
        data: JobDroppedEvent,
    },
    JobStarted {
        data: JobStartedEvent,
    },
    JobCompleted {
        data: JobCompletedEvent,
    },
    PaperEmpty {
        data: PaperEmptyEvent,
    },
    ScaleEvent {
        data: ScaleEvent,
    },
    WorkerRetired {
        data: WorkerRetiredEvent,
    },
    JobRemoved {
        data: JobRemovedEvent,
    },
    Statistics {
        data: RunStatistics,
    },
    SimulationEnd,
    SimulationStopped,
    Error {
        error: String,
    },
}

impl ServerMessage {
    pub fn error(msg: impl Into<String>) -> Self {
        ServerMessage::Error { error: msg.into() }
    }

    /// Marcadores que cierran una corrida.
    pub fn ends_run(&self) -> bool {
        matches!(
            self,
            ServerMessage::SimulationEnd | ServerMessage::SimulationStopped
        )
    }
}

impl From<&SimError> for ServerMessage {
    fn from(err: &SimError) -> Self {
        match err {
            SimError::Protocol(msg) => ServerMessage::error(msg.clone()),
            other => ServerMessage::error(other.to_string()),
        }
    }
}

/* --------- GET /api/config --------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub config: SimConfig,
    pub ranges: BTreeMap<String, FieldRange>,
}

impl ConfigResponse {
    pub fn from_defaults(config: SimConfig) -> Self {
        Self {
            config,
            ranges: config_ranges()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}
