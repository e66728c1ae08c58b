mod cli;
mod session;

use anyhow::Result;
use clap::Parser;
use common::{ClientEnvelope, ConfigResponse, ServerMessage};
use reqwest::Client;

use crate::cli::{server_base_url, ws_url, Cli, Commands};
use crate::session::{describe, Session};

fn is_terminal(msg: &ServerMessage) -> bool {
    msg.ends_run() || matches!(msg, ServerMessage::Error { .. })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_url = server_base_url();

    match cli.command {
        Commands::Config => {
            let url = format!("{}/api/config", base_url);
            let resp = Client::new().get(&url).send().await?.error_for_status()?;
            let ConfigResponse { config, ranges } = resp.json().await?;

            println!("Configuración por defecto:");
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("Rangos:");
            for (field, range) in ranges {
                println!("  {:<16} {} .. {}", field, range.min, range.max);
            }
        }
        Commands::Status => {
            let mut session = Session::connect(&ws_url(&base_url)).await?;
            session.send(&ClientEnvelope::bare("status")).await?;
            session
                .print_until(|m| matches!(m, ServerMessage::Status { .. }))
                .await?;
            session.close().await?;
        }
        Commands::Start { overrides, follow } => {
            let mut session = Session::connect(&ws_url(&base_url)).await?;
            session
                .send(&ClientEnvelope::start(overrides.into()))
                .await?;

            // start → simulation_start + parámetros, o un error
            session
                .print_until(|m| {
                    matches!(
                        m,
                        ServerMessage::SimulationParameters { .. } | ServerMessage::Error { .. }
                    )
                })
                .await?;

            if follow {
                session.print_until(is_terminal).await?;
            }
            session.close().await?;
        }
        Commands::Stop => {
            let mut session = Session::connect(&ws_url(&base_url)).await?;
            session.send(&ClientEnvelope::bare("stop")).await?;
            // con corrida: estadísticas + marcador; sin corrida: el estado
            session
                .print_until(|m| {
                    matches!(
                        m,
                        ServerMessage::SimulationStopped | ServerMessage::Status { .. }
                    )
                })
                .await?;
            session.close().await?;
        }
        Commands::Watch => {
            let mut session = Session::connect(&ws_url(&base_url)).await?;
            session.send(&ClientEnvelope::bare("status")).await?;
            let first = session.next().await?;
            println!("{}", describe(&first));
            session.print_until(is_terminal).await?;
            session.close().await?;
        }
    }

    Ok(())
}
