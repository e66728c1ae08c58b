use anyhow::{anyhow, Context, Result};
use common::{ClientEnvelope, RunStatus, ServerMessage};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Conexión websocket contra el servidor de simulación.
pub struct Session {
    ws: Ws,
}

impl Session {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("no se pudo conectar a {url}"))?;
        Ok(Self { ws })
    }

    pub async fn send(&mut self, envelope: &ClientEnvelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Próximo mensaje del servidor; ignora frames que no son texto.
    pub async fn next(&mut self) -> Result<ServerMessage> {
        while let Some(frame) = self.ws.next().await {
            if let Message::Text(text) = frame? {
                let msg = serde_json::from_str(&text)
                    .with_context(|| format!("mensaje inesperado del servidor: {text}"))?;
                return Ok(msg);
            }
        }
        Err(anyhow!("el servidor cerró la conexión"))
    }

    /// Imprime mensajes hasta que `stop` devuelva true para alguno.
    pub async fn print_until(&mut self, stop: impl Fn(&ServerMessage) -> bool) -> Result<()> {
        loop {
            let msg = self.next().await?;
            println!("{}", describe(&msg));
            if stop(&msg) {
                return Ok(());
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Una línea legible por mensaje.
pub fn describe(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::Status { status, data } => match (status, data) {
            (RunStatus::Running, Some(s)) => format!(
                "estado: running (t={}ms cola={} papel={:.1} impresoras={})",
                s.sim_time_ms, s.queue_depth, s.resource_level, s.worker_count
            ),
            (RunStatus::Running, None) => "estado: running".to_string(),
            (RunStatus::Idle, _) => "estado: idle".to_string(),
        },
        ServerMessage::SimulationStart => "simulación iniciada".to_string(),
        ServerMessage::SimulationParameters { data } => format!(
            "parámetros: jobs={} impresoras={} printRate={} autoScaling={} maxQueue={} papel={}",
            data.job_count,
            data.consumer_count,
            data.print_rate,
            data.auto_scaling,
            data.max_queue,
            data.paper_capacity
        ),
        ServerMessage::StatsUpdate { data } => format!(
            "[{:>7}ms] cola={:<3} papel={:>6.1} impresoras={}/{} completados={} descartados={}",
            data.sim_time_ms,
            data.queue_depth,
            data.resource_level,
            data.busy_workers,
            data.worker_count,
            data.completed,
            data.dropped
        ),
        ServerMessage::JobArrived { data } => format!(
            "job {} llegó ({} páginas, +{}ms, cola={})",
            data.job_id, data.papers, data.inter_arrival_ms, data.queue_depth
        ),
        ServerMessage::JobStarted { data } => format!(
            "job {} tomado por {} tras {}ms en cola",
            data.job_id, data.worker_id, data.waited_ms
        ),
        ServerMessage::JobDropped { data } => format!(
            "job {} descartado ({} páginas, cola={})",
            data.job_id, data.papers, data.queue_depth
        ),
        ServerMessage::JobCompleted { data } => format!(
            "job {} impreso por {} ({} páginas, {}ms en el sistema)",
            data.job_id, data.worker_id, data.papers, data.system_time_ms
        ),
        ServerMessage::PaperEmpty { data } => format!(
            "impresora {} sin papel para el job {} (necesita {}, hay {:.1})",
            data.worker_id, data.job_id, data.needed, data.available
        ),
        ServerMessage::ScaleEvent { data } => format!(
            "autoscaler {:?}: {} impresoras (cola={})",
            data.direction, data.worker_count, data.queue_depth
        ),
        ServerMessage::WorkerRetired { data } => format!(
            "impresora {} retirada ({} en servicio)",
            data.worker_id, data.worker_count
        ),
        ServerMessage::JobRemoved { data } => match data.worker_id {
            Some(worker) => format!("job {} removido de la impresora {}", data.job_id, worker),
            None => format!("job {} removido de la cola", data.job_id),
        },
        ServerMessage::Statistics { data } => format!(
            "estadísticas: llegaron={} completados={} descartados={} removidos={} \
             entre llegadas={:.0}ms espera media={:.0}ms sistema={:.0}±{:.0}ms cola media={:.2} pico cola={} \
             papel usado={} recargado={:.0} faltas de papel={} pico impresoras={}",
            data.arrived,
            data.completed,
            data.dropped,
            data.removed,
            data.avg_inter_arrival_ms,
            data.avg_queue_wait_ms,
            data.avg_system_time_ms,
            data.std_system_time_ms,
            data.avg_queue_depth,
            data.peak_queue_depth,
            data.paper_used,
            data.paper_refilled,
            data.paper_stalls,
            data.peak_workers
        ),
        ServerMessage::SimulationEnd => "simulación terminada".to_string(),
        ServerMessage::SimulationStopped => "simulación detenida".to_string(),
        ServerMessage::Error { error } => format!("error: {error}"),
    }
}
