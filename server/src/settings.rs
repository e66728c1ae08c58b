use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_TICK_MS: u64 = 50;
pub const DEFAULT_TIME_SCALE: f64 = 1.0;
pub const DEFAULT_SNAPSHOT_MS: u64 = 250;
pub const DEFAULT_AUTOSCALE_MS: u64 = 500;
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 1024;

pub const DEFAULT_LOG_FILTER: &str = "server=debug,worker=info,tower_http=info";

/// Parámetros del motor que no son parte de la config de una corrida.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Cada cuánto tiempo real avanza el driver.
    pub tick: Duration,
    /// ms simulados por cada ms real.
    pub time_scale: f64,
    /// Cadencia (simulada) de los stats_update.
    pub snapshot_interval_ms: u64,
    /// Cadencia (simulada) del autoscaler.
    pub autoscale_interval_ms: u64,
    /// Semilla fija para reproducir corridas; sin ella se sortea una.
    pub seed: Option<u64>,
}

impl EngineSettings {
    /// Paso simulado de cada tick, nunca menor a 1ms.
    pub fn step_ms(&self) -> u64 {
        ((self.tick.as_millis() as f64) * self.time_scale).round().max(1.0) as u64
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            time_scale: DEFAULT_TIME_SCALE,
            snapshot_interval_ms: DEFAULT_SNAPSHOT_MS,
            autoscale_interval_ms: DEFAULT_AUTOSCALE_MS,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: String,
    pub telemetry_capacity: usize,
    pub engine: EngineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            telemetry_capacity: DEFAULT_TELEMETRY_CAPACITY,
            engine: EngineSettings::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl Settings {
    /// Lee la configuración del proceso desde variables de entorno.
    /// - Local: default 127.0.0.1:8000
    /// - Docker: SIM_LISTEN_ADDR=0.0.0.0:8000
    pub fn from_env() -> Self {
        let time_scale = env_or("SIM_TIME_SCALE", DEFAULT_TIME_SCALE);
        let time_scale = if time_scale.is_finite() && time_scale > 0.0 {
            time_scale
        } else {
            DEFAULT_TIME_SCALE
        };

        Self {
            listen_addr: env::var("SIM_LISTEN_ADDR")
                .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
            telemetry_capacity: env_or("SIM_TELEMETRY_CAPACITY", DEFAULT_TELEMETRY_CAPACITY)
                .max(1),
            engine: EngineSettings {
                tick: Duration::from_millis(env_or("SIM_TICK_MS", DEFAULT_TICK_MS).max(1)),
                time_scale,
                snapshot_interval_ms: env_or("SIM_SNAPSHOT_MS", DEFAULT_SNAPSHOT_MS).max(1),
                autoscale_interval_ms: env_or("SIM_AUTOSCALE_MS", DEFAULT_AUTOSCALE_MS).max(1),
                seed: env::var("SIM_SEED").ok().and_then(|s| s.parse().ok()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paso_simulado_escala_con_el_tick() {
        let mut s = EngineSettings::default();
        assert_eq!(s.step_ms(), 50);

        s.time_scale = 10.0;
        assert_eq!(s.step_ms(), 500);

        s.time_scale = 0.001;
        assert_eq!(s.step_ms(), 1);
    }
}
