use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SimError, SimResult};

/* --------- Valores por defecto --------- */

pub const DEFAULT_PRINT_RATE: f64 = 5.0; // páginas/segundo
pub const DEFAULT_CONSUMER_COUNT: u32 = 2;
pub const DEFAULT_AUTO_SCALING: bool = false;
pub const DEFAULT_REFILL_RATE: f64 = 25.0; // papeles/segundo
pub const DEFAULT_PAPER_CAPACITY: u32 = 150;
pub const DEFAULT_JOB_ARRIVAL_TIME: f64 = 0.5; // segundos entre llegadas
pub const DEFAULT_JOB_COUNT: u32 = 10;
pub const DEFAULT_MAX_QUEUE: u32 = 20;
pub const DEFAULT_MIN_PAPERS: u32 = 5;
pub const DEFAULT_MAX_PAPERS: u32 = 15;

/* --------- Rangos válidos (inclusive) --------- */

pub const PRINT_RATE_RANGE: (f64, f64) = (1.0, 10.0);
pub const CONSUMER_COUNT_RANGE: (u32, u32) = (1, 5);
pub const REFILL_RATE_RANGE: (f64, f64) = (0.0, 50.0);
pub const PAPER_CAPACITY_RANGE: (u32, u32) = (50, 200);
pub const JOB_ARRIVAL_TIME_RANGE: (f64, f64) = (0.1, 5.0);
pub const JOB_COUNT_RANGE: (u32, u32) = (0, 1000);
pub const MAX_QUEUE_RANGE: (u32, u32) = (1, 100);
pub const MIN_PAPERS_RANGE: (u32, u32) = (1, 30);
pub const MAX_PAPERS_RANGE: (u32, u32) = (2, 60);

/// Configuración efectiva de una corrida. Inmutable mientras la corrida vive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimConfig {
    pub print_rate: f64,
    pub consumer_count: u32,
    pub auto_scaling: bool,
    pub refill_rate: f64,
    pub paper_capacity: u32,
    pub job_arrival_time: f64,
    pub job_count: u32,
    pub max_queue: u32,
    pub min_papers: u32,
    pub max_papers: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            print_rate: DEFAULT_PRINT_RATE,
            consumer_count: DEFAULT_CONSUMER_COUNT,
            auto_scaling: DEFAULT_AUTO_SCALING,
            refill_rate: DEFAULT_REFILL_RATE,
            paper_capacity: DEFAULT_PAPER_CAPACITY,
            job_arrival_time: DEFAULT_JOB_ARRIVAL_TIME,
            job_count: DEFAULT_JOB_COUNT,
            max_queue: DEFAULT_MAX_QUEUE,
            min_papers: DEFAULT_MIN_PAPERS,
            max_papers: DEFAULT_MAX_PAPERS,
        }
    }
}

/// Overrides que llegan con el comando `start`; cualquier campo puede faltar.
/// Los campos enteros aceptan cualquier número JSON: un negativo o un
/// fraccionario es una configuración inválida, no un payload roto.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refill_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_arrival_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_papers: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_papers: Option<f64>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Rango publicado en /api/config. Los booleanos se publican como 0..1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    fn new(min: impl Into<f64>, max: impl Into<f64>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }
}

/// Rangos de todos los campos, con las mismas claves que `SimConfig`.
pub fn config_ranges() -> BTreeMap<&'static str, FieldRange> {
    BTreeMap::from([
        ("printRate", FieldRange::new(PRINT_RATE_RANGE.0, PRINT_RATE_RANGE.1)),
        (
            "consumerCount",
            FieldRange::new(CONSUMER_COUNT_RANGE.0, CONSUMER_COUNT_RANGE.1),
        ),
        ("autoScaling", FieldRange::new(0, 1)),
        ("refillRate", FieldRange::new(REFILL_RATE_RANGE.0, REFILL_RATE_RANGE.1)),
        (
            "paperCapacity",
            FieldRange::new(PAPER_CAPACITY_RANGE.0, PAPER_CAPACITY_RANGE.1),
        ),
        (
            "jobArrivalTime",
            FieldRange::new(JOB_ARRIVAL_TIME_RANGE.0, JOB_ARRIVAL_TIME_RANGE.1),
        ),
        ("jobCount", FieldRange::new(JOB_COUNT_RANGE.0, JOB_COUNT_RANGE.1)),
        ("maxQueue", FieldRange::new(MAX_QUEUE_RANGE.0, MAX_QUEUE_RANGE.1)),
        ("minPapers", FieldRange::new(MIN_PAPERS_RANGE.0, MIN_PAPERS_RANGE.1)),
        ("maxPapers", FieldRange::new(MAX_PAPERS_RANGE.0, MAX_PAPERS_RANGE.1)),
    ])
}

fn check_f64(field: &str, value: f64, (min, max): (f64, f64)) -> SimResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(SimError::invalid_config(format!(
            "{field} debe estar entre {min} y {max} (llegó {value})"
        )));
    }
    Ok(())
}

/// Valida un override entero y lo convierte; `None` deja el valor actual.
fn pick_count(
    field: &str,
    value: Option<f64>,
    current: u32,
    (min, max): (u32, u32),
) -> SimResult<u32> {
    let Some(value) = value else {
        return Ok(current);
    };
    if !value.is_finite() || value.fract() != 0.0 || value < min as f64 || value > max as f64 {
        return Err(SimError::invalid_config(format!(
            "{field} debe ser un entero entre {min} y {max} (llegó {value})"
        )));
    }
    Ok(value as u32)
}

fn check_u32(field: &str, value: u32, (min, max): (u32, u32)) -> SimResult<()> {
    if value < min || value > max {
        return Err(SimError::invalid_config(format!(
            "{field} debe estar entre {min} y {max} (llegó {value})"
        )));
    }
    Ok(())
}

impl SimConfig {
    /// Aplica los overrides sobre `self` y valida el resultado completo.
    /// Si algo falla se devuelve el error y no se construye nada.
    pub fn merge(&self, overrides: &ConfigOverrides) -> SimResult<SimConfig> {
        let merged = SimConfig {
            print_rate: overrides.print_rate.unwrap_or(self.print_rate),
            consumer_count: pick_count(
                "consumerCount",
                overrides.consumer_count,
                self.consumer_count,
                CONSUMER_COUNT_RANGE,
            )?,
            auto_scaling: overrides.auto_scaling.unwrap_or(self.auto_scaling),
            refill_rate: overrides.refill_rate.unwrap_or(self.refill_rate),
            paper_capacity: pick_count(
                "paperCapacity",
                overrides.paper_capacity,
                self.paper_capacity,
                PAPER_CAPACITY_RANGE,
            )?,
            job_arrival_time: overrides.job_arrival_time.unwrap_or(self.job_arrival_time),
            job_count: pick_count("jobCount", overrides.job_count, self.job_count, JOB_COUNT_RANGE)?,
            max_queue: pick_count("maxQueue", overrides.max_queue, self.max_queue, MAX_QUEUE_RANGE)?,
            min_papers: pick_count(
                "minPapers",
                overrides.min_papers,
                self.min_papers,
                MIN_PAPERS_RANGE,
            )?,
            max_papers: pick_count(
                "maxPapers",
                overrides.max_papers,
                self.max_papers,
                MAX_PAPERS_RANGE,
            )?,
        };
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> SimResult<()> {
        check_f64("printRate", self.print_rate, PRINT_RATE_RANGE)?;
        check_u32("consumerCount", self.consumer_count, CONSUMER_COUNT_RANGE)?;
        check_f64("refillRate", self.refill_rate, REFILL_RATE_RANGE)?;
        check_u32("paperCapacity", self.paper_capacity, PAPER_CAPACITY_RANGE)?;
        check_f64("jobArrivalTime", self.job_arrival_time, JOB_ARRIVAL_TIME_RANGE)?;
        check_u32("jobCount", self.job_count, JOB_COUNT_RANGE)?;
        check_u32("maxQueue", self.max_queue, MAX_QUEUE_RANGE)?;
        check_u32("minPapers", self.min_papers, MIN_PAPERS_RANGE)?;
        check_u32("maxPapers", self.max_papers, MAX_PAPERS_RANGE)?;

        if self.min_papers >= self.max_papers {
            return Err(SimError::invalid_config(format!(
                "minPapers ({}) debe ser menor que maxPapers ({})",
                self.min_papers, self.max_papers
            )));
        }
        if self.max_papers > self.paper_capacity {
            return Err(SimError::invalid_config(format!(
                "maxPapers ({}) no puede superar paperCapacity ({})",
                self.max_papers, self.paper_capacity
            )));
        }
        Ok(())
    }

    /// Intervalo entre llegadas en milisegundos simulados.
    pub fn arrival_interval_ms(&self) -> u64 {
        (self.job_arrival_time * 1000.0).round().max(1.0) as u64
    }

    /// Tiempo de servicio de un trabajo de `papers` páginas, en ms simulados.
    pub fn service_time_ms(&self, papers: u32) -> u64 {
        ((papers as f64 / self.print_rate) * 1000.0).round() as u64
    }
}
