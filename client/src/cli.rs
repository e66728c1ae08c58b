use clap::{Args, Parser, Subcommand};
use common::ConfigOverrides;
use std::env;

/// Igual que el servidor:
/// - Local: default http://127.0.0.1:8000
/// - Otro host: SIM_SERVER_URL=http://host:8000
pub fn server_base_url() -> String {
    env::var("SIM_SERVER_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
}

/// URL del websocket de control a partir de la URL HTTP base.
pub fn ws_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}/ws/simulation")
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI para controlar y observar la simulación de impresión")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Muestra la configuración por defecto y los rangos válidos
    Config,
    /// Consulta si hay una simulación corriendo
    Status,
    /// Arranca una simulación (los campos que falten toman el default)
    Start {
        #[command(flatten)]
        overrides: OverrideArgs,

        /// Sigue mostrando la telemetría hasta que la corrida termine
        #[arg(long)]
        follow: bool,
    },
    /// Detiene la simulación en curso
    Stop,
    /// Muestra la telemetría hasta que la corrida termine
    Watch,
}

#[derive(Args, Debug, Default, Clone)]
pub struct OverrideArgs {
    /// Páginas por segundo de cada impresora
    #[arg(long)]
    pub print_rate: Option<f64>,
    /// Impresoras iniciales
    #[arg(long)]
    pub consumer_count: Option<u32>,
    #[arg(long)]
    pub auto_scaling: Option<bool>,
    /// Papel que entra a la bandeja por segundo
    #[arg(long)]
    pub refill_rate: Option<f64>,
    #[arg(long)]
    pub paper_capacity: Option<u32>,
    /// Segundos entre llegadas
    #[arg(long)]
    pub job_arrival_time: Option<f64>,
    #[arg(long)]
    pub job_count: Option<u32>,
    #[arg(long)]
    pub max_queue: Option<u32>,
    #[arg(long)]
    pub min_papers: Option<u32>,
    #[arg(long)]
    pub max_papers: Option<u32>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(a: OverrideArgs) -> Self {
        ConfigOverrides {
            print_rate: a.print_rate,
            consumer_count: a.consumer_count.map(f64::from),
            auto_scaling: a.auto_scaling,
            refill_rate: a.refill_rate,
            paper_capacity: a.paper_capacity.map(f64::from),
            job_arrival_time: a.job_arrival_time,
            job_count: a.job_count.map(f64::from),
            max_queue: a.max_queue.map(f64::from),
            min_papers: a.min_papers.map(f64::from),
            max_papers: a.max_papers.map(f64::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_cambia_el_esquema() {
        assert_eq!(
            ws_url("http://127.0.0.1:8000"),
            "ws://127.0.0.1:8000/ws/simulation"
        );
        assert_eq!(
            ws_url("https://sim.local/"),
            "wss://sim.local/ws/simulation"
        );
    }

    #[test]
    fn start_parsea_overrides_y_follow() {
        let cli = Cli::try_parse_from([
            "client",
            "start",
            "--job-count",
            "10",
            "--print-rate",
            "2.0",
            "--auto-scaling",
            "true",
            "--follow",
        ])
        .unwrap();

        match cli.command {
            Commands::Start { overrides, follow } => {
                assert!(follow);
                let ov = ConfigOverrides::from(overrides);
                assert_eq!(ov.job_count, Some(10.0));
                assert_eq!(ov.print_rate, Some(2.0));
                assert_eq!(ov.auto_scaling, Some(true));
                assert_eq!(ov.max_queue, None);
            }
            _ => panic!("esperaba start"),
        }
    }
}
