use thiserror::Error;

/// Errores de la simulación.
/// Todos salvo `InvariantViolation` se recuperan en el punto donde se detectan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Un override de configuración fuera de rango (el start se aborta).
    #[error("configuración inválida: {0}")]
    InvalidConfig(String),

    /// Start mientras ya hay una simulación corriendo.
    #[error("ya hay una simulación en curso")]
    AlreadyRunning,

    /// Llegada rechazada por cola llena; se cuenta como descartada.
    #[error("la cola de trabajos está llena")]
    QueueFull,

    /// No hay papel suficiente en la bandeja para el trabajo.
    #[error("papel insuficiente: se necesitan {needed}, hay {available:.1}")]
    InsufficientResource { needed: u32, available: f64 },

    /// Payload indecodificable o comando desconocido.
    #[error("error de protocolo: {0}")]
    Protocol(String),

    /// Estado interno roto; es lo único que aborta una corrida.
    #[error("invariante violada: {0}")]
    InvariantViolation(String),
}

impl SimError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
