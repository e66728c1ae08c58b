use std::sync::{Arc, Mutex, MutexGuard};

use common::protocol::{
    JobArrivedEvent, JobCompletedEvent, JobDroppedEvent, JobRemovedEvent, JobStartedEvent,
    PaperEmptyEvent, ScaleDirection, ScaleEvent, WorkerRetiredEvent,
};
use common::{
    ConfigOverrides, JobQueue, PaperTray, QueueFull, RunStatistics, RunStatus, ServerMessage,
    SimConfig, SimError, SimResult, Snapshot, WorkerId,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use worker::{Autoscaler, Retirement, ScalingContext, ScalingDecision, WorkerEvent, WorkerPool};

use crate::arrivals::ArrivalProcess;
use crate::settings::EngineSettings;
use crate::stats::RunStats;
use crate::telemetry::Telemetry;

/* ---------------- núcleo de una corrida ---------------- */

/// Estado completo de una corrida. No sabe nada de tasks ni de sockets:
/// sólo avanza el tiempo simulado cuando se lo piden.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    now_ms: u64,
    snapshot_interval_ms: u64,
    since_snapshot_ms: u64,

    tray: PaperTray,
    queue: JobQueue,
    arrivals: ArrivalProcess,
    pool: WorkerPool,
    autoscaler: Option<Autoscaler>,
    stats: RunStats,
}

impl Simulation {
    pub fn new(config: SimConfig, settings: &EngineSettings, seed: u64) -> Self {
        let autoscaler = config
            .auto_scaling
            .then(|| Autoscaler::new(&config, settings.autoscale_interval_ms));

        Self {
            tray: PaperTray::new(config.paper_capacity, config.refill_rate),
            queue: JobQueue::with_capacity(config.max_queue as usize),
            arrivals: ArrivalProcess::new(&config, seed),
            pool: WorkerPool::with_workers(config.consumer_count),
            autoscaler,
            stats: RunStats::default(),
            now_ms: 0,
            snapshot_interval_ms: settings.snapshot_interval_ms.max(1),
            since_snapshot_ms: 0,
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sim_time_ms: self.now_ms,
            queue_depth: self.queue.len(),
            resource_level: self.tray.level(),
            worker_count: self.pool.active_count(),
            busy_workers: self.pool.busy_count(),
            arrived: self.stats.arrived,
            completed: self.stats.completed,
            dropped: self.stats.dropped,
        }
    }

    /// Avanza `step_ms` de tiempo simulado y deja en `messages` la telemetría
    /// del tick. Devuelve true cuando la corrida terminó sola.
    ///
    /// Orden fijo: recarga → llegadas → impresoras → autoscaler → chequeo →
    /// snapshot → fin natural. Si el chequeo falla, lo que el tick ya produjo
    /// queda en `messages` igual.
    pub fn tick(&mut self, step_ms: u64, messages: &mut Vec<ServerMessage>) -> SimResult<bool> {
        self.now_ms += step_ms;

        // 1) recarga de papel
        let added = self.tray.refill(step_ms as f64 / 1000.0);
        self.stats.record_refill(added);

        // 2) llegadas
        for mut job in self.arrivals.due(self.now_ms) {
            let gap = self.stats.record_arrival(job.created_at_ms);
            messages.push(ServerMessage::JobArrived {
                data: JobArrivedEvent {
                    job_id: job.id,
                    papers: job.papers,
                    arrived_at_ms: job.created_at_ms,
                    inter_arrival_ms: gap,
                    queue_depth: self.queue.len(),
                },
            });

            job.enqueued_at_ms = Some(job.created_at_ms);
            if let Err(QueueFull(job)) = self.queue.enqueue(job) {
                self.stats.record_drop();
                debug!("job {} descartado: {}", job.id, SimError::QueueFull);
                messages.push(ServerMessage::JobDropped {
                    data: JobDroppedEvent {
                        job_id: job.id,
                        papers: job.papers,
                        queue_depth: self.queue.len(),
                    },
                });
            }
        }

        // 3) servicio de las impresoras
        let events = self.pool.step(
            self.now_ms,
            step_ms,
            &mut self.queue,
            &mut self.tray,
            &self.config,
        );
        for event in events {
            self.apply_worker_event(event, messages);
        }

        // 4) autoscaler
        self.autoscale(step_ms, messages);

        self.stats.sample_queue(self.queue.len(), step_ms);

        // 5) invariantes
        self.check_invariants()?;

        // 6) snapshot periódico
        self.since_snapshot_ms += step_ms;
        if self.since_snapshot_ms >= self.snapshot_interval_ms {
            self.since_snapshot_ms %= self.snapshot_interval_ms;
            messages.push(ServerMessage::StatsUpdate {
                data: self.snapshot(),
            });
        }

        // 7) fin natural
        Ok(self.arrivals.is_exhausted() && self.queue.is_empty() && self.pool.in_flight() == 0)
    }

    fn apply_worker_event(&mut self, event: WorkerEvent, messages: &mut Vec<ServerMessage>) {
        match event {
            WorkerEvent::Claimed {
                worker_id,
                job_id,
                papers,
                waited_ms,
                queue_depth,
            } => messages.push(ServerMessage::JobStarted {
                data: JobStartedEvent {
                    job_id,
                    worker_id,
                    papers,
                    waited_ms,
                    queue_depth,
                },
            }),
            WorkerEvent::Started { papers, .. } => self.stats.record_start(papers),
            WorkerEvent::Stalled {
                worker_id,
                job_id,
                needed,
                available,
            } => {
                self.stats.record_stall();
                info!(
                    "impresora {} sin papel para el job {} (necesita {}, hay {:.1})",
                    worker_id, job_id, needed, available
                );
                messages.push(ServerMessage::PaperEmpty {
                    data: PaperEmptyEvent {
                        worker_id,
                        job_id,
                        needed,
                        available,
                    },
                });
            }
            WorkerEvent::Completed { worker_id, job } => {
                self.stats.record_completion(&job);
                messages.push(ServerMessage::JobCompleted {
                    data: JobCompletedEvent {
                        job_id: job.id,
                        worker_id,
                        papers: job.papers,
                        system_time_ms: job.system_time_ms().unwrap_or_default(),
                    },
                });
            }
            WorkerEvent::Retired { worker_id } => {
                info!("impresora {} fuera del pool", worker_id);
                messages.push(self.retired_message(worker_id));
            }
        }
    }

    fn retired_message(&self, worker_id: WorkerId) -> ServerMessage {
        ServerMessage::WorkerRetired {
            data: WorkerRetiredEvent {
                worker_id,
                worker_count: self.pool.active_count(),
            },
        }
    }

    fn autoscale(&mut self, step_ms: u64, messages: &mut Vec<ServerMessage>) {
        let Some(scaler) = self.autoscaler.as_mut() else {
            return;
        };
        if !scaler.due(step_ms) {
            return;
        }

        let ctx = ScalingContext {
            queue_depth: self.queue.len(),
            workers: self.pool.active_count(),
            paper_level: self.tray.level(),
        };

        // una impresora libre se va en el acto; una ocupada avisa al terminar
        let mut removed = None;
        let direction = match scaler.decide(&ctx) {
            ScalingDecision::Hold => return,
            ScalingDecision::ScaleUp { reason } => {
                let id = self.pool.spawn();
                info!("autoscaler: +1 impresora (id {}): {}", id, reason);
                ScaleDirection::Up
            }
            ScalingDecision::ScaleDown { reason } => match self.pool.retire_one() {
                Some(retirement) => {
                    info!("autoscaler: -1 impresora ({:?}): {}", retirement, reason);
                    if let Retirement::Removed(id) = retirement {
                        removed = Some(id);
                    }
                    ScaleDirection::Down
                }
                None => return,
            },
        };

        messages.push(ServerMessage::ScaleEvent {
            data: ScaleEvent {
                direction,
                worker_count: self.pool.active_count(),
                queue_depth: self.queue.len(),
            },
        });
        if let Some(id) = removed {
            messages.push(self.retired_message(id));
        }
    }

    fn check_invariants(&self) -> SimResult<()> {
        if self.queue.len() > self.queue.capacity() {
            return Err(SimError::InvariantViolation(format!(
                "cola con {} trabajos y capacidad {}",
                self.queue.len(),
                self.queue.capacity()
            )));
        }

        let level = self.tray.level();
        if !(0.0..=self.tray.capacity()).contains(&level) {
            return Err(SimError::InvariantViolation(format!(
                "papel fuera de rango: {:.2} (capacidad {})",
                level,
                self.tray.capacity()
            )));
        }

        let accounted = self.stats.completed
            + self.stats.dropped
            + self.queue.len() as u64
            + self.pool.in_flight() as u64;
        if accounted != self.stats.arrived {
            return Err(SimError::InvariantViolation(format!(
                "contadores inconsistentes: llegaron {} pero se cuentan {}",
                self.stats.arrived, accounted
            )));
        }

        Ok(())
    }

    /// Estadísticas finales sin tocar el estado (fin natural).
    pub fn statistics(&self) -> RunStatistics {
        self.stats.finish(
            self.queue.peak(),
            self.pool.peak(),
            self.now_ms,
            self.pool.statistics(),
        )
    }

    /// Corta la corrida (stop): todo lo que estaba en cola o imprimiéndose
    /// se cuenta como removido, sin crédito de completado. Cada trabajo
    /// sacado deja un `job_removed` en `messages`.
    pub fn abort(&mut self, messages: &mut Vec<ServerMessage>) -> RunStatistics {
        let in_flight = self.pool.abandon_all();
        let queued = self.queue.drain();
        self.stats.record_removed(in_flight.len() + queued.len());

        let held = in_flight
            .into_iter()
            .map(|(worker_id, job)| (Some(worker_id), job));
        let waiting = queued.into_iter().map(|job| (None, job));
        for (worker_id, job) in held.chain(waiting) {
            messages.push(ServerMessage::JobRemoved {
                data: JobRemovedEvent {
                    job_id: job.id,
                    papers: job.papers,
                    worker_id,
                },
            });
        }

        self.statistics()
    }
}

/* ---------------- handle compartido ---------------- */

struct ActiveRun {
    id: u64,
    sim: Simulation,
    driver: Option<JoinHandle<()>>,
}

struct EngineInner {
    next_run_id: u64,
    active: Option<ActiveRun>,
}

/// Qué pasó con un pedido de stop.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Había una corrida y se cortó.
    Stopped(RunStatistics),
    /// No había nada corriendo.
    WasIdle,
}

/// Handle del motor. Hay uno por servidor y se clona barato.
///
/// Todas las transiciones de estado pasan por el mismo mutex; el driver
/// re-chequea el id de la corrida dentro del lock antes de cada tick, así un
/// stop y un fin natural nunca desarman la misma corrida dos veces.
#[derive(Clone)]
pub struct SimulationEngine {
    inner: Arc<Mutex<EngineInner>>,
    telemetry: Telemetry,
    status_tx: Arc<watch::Sender<ServerMessage>>,
    status_rx: watch::Receiver<ServerMessage>,
    defaults: SimConfig,
    settings: EngineSettings,
}

fn idle_status() -> ServerMessage {
    ServerMessage::Status {
        status: RunStatus::Idle,
        data: None,
    }
}

fn running_status(sim: &Simulation) -> ServerMessage {
    ServerMessage::Status {
        status: RunStatus::Running,
        data: Some(sim.snapshot()),
    }
}

impl SimulationEngine {
    pub fn new(defaults: SimConfig, settings: EngineSettings, telemetry: Telemetry) -> Self {
        let (status_tx, status_rx) = watch::channel(idle_status());
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                next_run_id: 0,
                active: None,
            })),
            telemetry,
            status_tx: Arc::new(status_tx),
            status_rx,
            defaults,
            settings,
        }
    }

    pub fn defaults(&self) -> &SimConfig {
        &self.defaults
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.telemetry.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Estado actual; no espera al driver.
    pub fn status(&self) -> ServerMessage {
        self.status_rx.borrow().clone()
    }

    pub fn run_status(&self) -> RunStatus {
        match &*self.status_rx.borrow() {
            ServerMessage::Status { status, .. } => *status,
            _ => RunStatus::Idle,
        }
    }

    /// Arranca una corrida nueva con los overrides sobre los defaults.
    /// Debe llamarse dentro de un runtime de tokio (lanza el driver).
    pub fn start(&self, overrides: ConfigOverrides) -> SimResult<SimConfig> {
        let mut inner = self.lock();

        if let Some(active) = &inner.active {
            warn!("start rechazado: la corrida {} sigue activa", active.id);
            return Err(SimError::AlreadyRunning);
        }

        let config = self.defaults.merge(&overrides).map_err(|e| {
            warn!("start rechazado: {}", e);
            e
        })?;

        inner.next_run_id += 1;
        let run_id = inner.next_run_id;
        let seed = self.settings.seed.unwrap_or_else(rand::random);
        let sim = Simulation::new(config.clone(), &self.settings, seed);

        info!(
            "corrida {} arrancada (jobs={} impresoras={} autoscaling={} semilla={})",
            run_id, config.job_count, config.consumer_count, config.auto_scaling, seed
        );

        self.telemetry.publish(ServerMessage::SimulationStart);
        self.telemetry.publish(ServerMessage::SimulationParameters {
            data: config.clone(),
        });
        self.status_tx.send_replace(running_status(&sim));

        let driver = tokio::spawn(self.clone().drive(run_id));
        inner.active = Some(ActiveRun {
            id: run_id,
            sim,
            driver: Some(driver),
        });

        Ok(config)
    }

    /// Corta la corrida activa. Sin corrida es un no-op.
    pub fn stop(&self) -> StopOutcome {
        let mut inner = self.lock();

        let Some(mut run) = inner.active.take() else {
            debug!("stop sin corrida activa");
            return StopOutcome::WasIdle;
        };

        if let Some(driver) = run.driver.take() {
            driver.abort();
        }

        let mut removed = Vec::new();
        let statistics = run.sim.abort(&mut removed);
        info!(
            "corrida {} detenida en t={}ms (completados={} removidos={})",
            run.id,
            run.sim.now_ms(),
            statistics.completed,
            statistics.removed
        );

        self.status_tx.send_replace(idle_status());
        for msg in removed {
            self.telemetry.publish(msg);
        }
        self.telemetry.publish(ServerMessage::Statistics {
            data: statistics.clone(),
        });
        self.telemetry.publish(ServerMessage::SimulationStopped);

        StopOutcome::Stopped(statistics)
    }

    /// Loop del driver: un tick de reloj real por cada `settings.tick`.
    async fn drive(self, run_id: u64) {
        let step_ms = self.settings.step_ms();
        let mut interval = tokio::time::interval(self.settings.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // el primer tick de interval es inmediato
        interval.tick().await;

        loop {
            interval.tick().await;
            if !self.tick_once(run_id, step_ms) {
                break;
            }
        }
        debug!("driver de la corrida {} terminado", run_id);
    }

    /// Un tick bajo el lock. Devuelve false cuando el driver debe terminar.
    fn tick_once(&self, run_id: u64, step_ms: u64) -> bool {
        let mut inner = self.lock();

        let Some(run) = inner.active.as_mut().filter(|r| r.id == run_id) else {
            // la corrida ya no es nuestra (stop o corrida nueva)
            return false;
        };

        let mut messages = Vec::new();
        let result = run.sim.tick(step_ms, &mut messages);
        // lo que el tick alcanzó a producir sale aunque haya fallado
        for msg in messages {
            self.telemetry.publish(msg);
        }

        match result {
            Ok(false) => {
                self.status_tx.send_replace(running_status(&run.sim));
                true
            }
            Ok(true) => {
                let statistics = run.sim.statistics();
                info!(
                    "corrida {} terminada en t={}ms (completados={} descartados={})",
                    run_id,
                    run.sim.now_ms(),
                    statistics.completed,
                    statistics.dropped
                );
                inner.active = None;

                self.status_tx.send_replace(idle_status());
                self.telemetry.publish(ServerMessage::Statistics { data: statistics });
                self.telemetry.publish(ServerMessage::SimulationEnd);
                false
            }
            Err(err) => {
                error!("corrida {} abortada: {}", run_id, err);
                inner.active = None;

                self.status_tx.send_replace(idle_status());
                self.telemetry.publish(ServerMessage::from(&err));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::next_message;
    use std::time::Duration;

    fn settings() -> EngineSettings {
        EngineSettings {
            tick: Duration::from_millis(50),
            time_scale: 10.0,
            seed: Some(7),
            ..Default::default()
        }
    }

    fn engine() -> SimulationEngine {
        SimulationEngine::new(SimConfig::default(), settings(), Telemetry::new(4096))
    }

    fn scenario() -> ConfigOverrides {
        ConfigOverrides {
            job_count: Some(10.0),
            print_rate: Some(2.0),
            consumer_count: Some(2.0),
            paper_capacity: Some(50.0),
            ..Default::default()
        }
    }

    /// Un tick; devuelve la telemetría y si la corrida terminó.
    fn step(sim: &mut Simulation, step_ms: u64) -> (Vec<ServerMessage>, bool) {
        let mut messages = Vec::new();
        let finished = sim.tick(step_ms, &mut messages).unwrap();
        (messages, finished)
    }

    fn run_to_end(sim: &mut Simulation, step_ms: u64) -> Vec<ServerMessage> {
        let mut all = Vec::new();
        for _ in 0..100_000 {
            let (messages, finished) = step(sim, step_ms);
            all.extend(messages);
            if finished {
                return all;
            }
        }
        panic!("la corrida no terminó");
    }

    fn count(msgs: &[ServerMessage], pred: impl Fn(&ServerMessage) -> bool) -> u64 {
        msgs.iter().filter(|m| pred(m)).count() as u64
    }

    fn lifecycle(msg: &ServerMessage) -> Option<(&'static str, u64)> {
        match msg {
            ServerMessage::JobArrived { data } => Some(("arrived", data.job_id)),
            ServerMessage::JobStarted { data } => Some(("started", data.job_id)),
            ServerMessage::JobCompleted { data } => Some(("completed", data.job_id)),
            _ => None,
        }
    }

    /* ----- núcleo ----- */

    #[test]
    fn escenario_basico_completa_los_diez_jobs() {
        let cfg = SimConfig::default().merge(&scenario()).unwrap();
        let mut sim = Simulation::new(cfg, &settings(), 7);

        let msgs = run_to_end(&mut sim, 50);
        let stats = sim.statistics();

        assert_eq!(stats.arrived, 10);
        assert_eq!(stats.completed + stats.dropped, 10);
        let completed_msgs = count(&msgs, |m| matches!(m, ServerMessage::JobCompleted { .. }));
        assert_eq!(completed_msgs, stats.completed);
        assert!(stats.avg_inter_arrival_ms > 0.0);
    }

    #[test]
    fn cada_job_cuenta_su_recorrido() {
        let cfg = SimConfig::default().merge(&scenario()).unwrap();
        let mut sim = Simulation::new(cfg, &settings(), 7);

        let msgs = run_to_end(&mut sim, 50);
        let stats = sim.statistics();

        let arrived = count(&msgs, |m| matches!(m, ServerMessage::JobArrived { .. }));
        let started = count(&msgs, |m| matches!(m, ServerMessage::JobStarted { .. }));
        assert_eq!(arrived, stats.arrived);
        assert_eq!(started, stats.completed);

        // cada job llega, lo toma una impresora y termina, en ese orden
        for id in 1..=10 {
            let pos = |kind: &str| {
                msgs.iter()
                    .position(|m| lifecycle(m) == Some((kind, id)))
                    .unwrap_or_else(|| panic!("job {id} sin {kind}"))
            };
            assert!(pos("arrived") < pos("started"), "job {id} fuera de orden");
            assert!(pos("started") < pos("completed"), "job {id} fuera de orden");
        }

        match msgs.iter().find(|m| matches!(m, ServerMessage::JobArrived { .. })) {
            Some(ServerMessage::JobArrived { data }) => {
                assert_eq!(data.job_id, 1);
                assert_eq!(data.arrived_at_ms, 500);
                assert_eq!(data.inter_arrival_ms, 500);
            }
            other => panic!("esperaba job_arrived, llegó {other:?}"),
        }
    }

    #[test]
    fn sin_autoscaling_el_pool_queda_fijo() {
        let overrides = ConfigOverrides {
            job_count: Some(60.0),
            job_arrival_time: Some(0.1),
            max_queue: Some(10.0),
            consumer_count: Some(3.0),
            ..Default::default()
        };
        let cfg = SimConfig::default().merge(&overrides).unwrap();
        let mut sim = Simulation::new(cfg, &settings(), 3);

        loop {
            let (messages, finished) = step(&mut sim, 50);
            assert_eq!(sim.pool().active_count(), 3);
            assert!(messages
                .iter()
                .all(|m| !matches!(m, ServerMessage::ScaleEvent { .. })));
            if finished {
                break;
            }
        }
        let stats = sim.statistics();
        assert!(stats.dropped > 0);
        assert_eq!(stats.peak_workers, 3);
    }

    #[test]
    fn con_autoscaling_y_cola_cargada_sube_impresoras() {
        let overrides = ConfigOverrides {
            auto_scaling: Some(true),
            job_count: Some(200.0),
            job_arrival_time: Some(0.1),
            print_rate: Some(1.0),
            max_queue: Some(30.0),
            refill_rate: Some(50.0),
            paper_capacity: Some(200.0),
            ..Default::default()
        };
        let cfg = SimConfig::default().merge(&overrides).unwrap();
        let mut sim = Simulation::new(cfg, &settings(), 11);

        let mut counts = vec![sim.pool().active_count()];
        for _ in 0..400 {
            let (messages, _) = step(&mut sim, 50);
            for m in messages {
                if let ServerMessage::ScaleEvent { data } = m {
                    assert_eq!(data.direction, ScaleDirection::Up);
                    counts.push(data.worker_count);
                }
            }
        }

        assert!(counts.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(*counts.last().unwrap(), worker::autoscaler::MAX_WORKERS);
    }

    #[test]
    fn snapshots_no_dependen_del_tamano_del_tick() {
        let cfg = SimConfig {
            job_count: 1000,
            ..Default::default()
        };
        let mut sim = Simulation::new(cfg, &settings(), 1);

        let mut updates = 0;
        for _ in 0..100 {
            // 100 ticks de 10ms = 1s simulado → 4 snapshots de 250ms
            let (messages, _) = step(&mut sim, 10);
            updates += messages
                .iter()
                .filter(|m| matches!(m, ServerMessage::StatsUpdate { .. }))
                .count();
        }
        assert_eq!(updates, 4);
    }

    #[test]
    fn job_count_cero_termina_en_el_primer_tick() {
        let cfg = SimConfig {
            job_count: 0,
            ..Default::default()
        };
        let mut sim = Simulation::new(cfg, &settings(), 1);
        assert!(step(&mut sim, 50).1);
    }

    #[test]
    fn abort_cuenta_en_cola_y_en_vuelo_como_removidos() {
        let cfg = SimConfig {
            job_count: 20,
            job_arrival_time: 0.1,
            print_rate: 1.0,
            ..Default::default()
        };
        let mut sim = Simulation::new(cfg, &settings(), 5);
        for _ in 0..20 {
            step(&mut sim, 50);
        }
        let held = sim.pool().in_flight() as u64;

        let mut removed = Vec::new();
        let stats = sim.abort(&mut removed);
        assert_eq!(
            stats.arrived,
            stats.completed + stats.dropped + stats.removed
        );
        assert!(stats.removed > 0);
        assert_eq!(sim.pool().in_flight(), 0);

        // un job_removed por trabajo; los que tenía una impresora la nombran
        assert_eq!(removed.len() as u64, stats.removed);
        let with_worker = count(&removed, |m| {
            matches!(m, ServerMessage::JobRemoved { data } if data.worker_id.is_some())
        });
        assert_eq!(with_worker, held);
    }

    #[test]
    fn con_autoscaling_sube_con_la_rafaga_y_baja_al_drenar() {
        let overrides = ConfigOverrides {
            auto_scaling: Some(true),
            job_count: Some(60.0),
            job_arrival_time: Some(0.1),
            max_queue: Some(40.0),
            refill_rate: Some(50.0),
            paper_capacity: Some(200.0),
            ..Default::default()
        };
        let cfg = SimConfig::default().merge(&overrides).unwrap();
        let baseline = cfg.consumer_count as usize;
        let mut sim = Simulation::new(cfg, &settings(), 13);

        let mut msgs = run_to_end(&mut sim, 50);
        // ya drenada, el autoscaler sigue bajando hasta la base
        for _ in 0..200 {
            msgs.extend(step(&mut sim, 50).0);
        }

        let ups = count(&msgs, |m| {
            matches!(m, ServerMessage::ScaleEvent { data } if data.direction == ScaleDirection::Up)
        });
        let downs = count(&msgs, |m| {
            matches!(m, ServerMessage::ScaleEvent { data } if data.direction == ScaleDirection::Down)
        });
        let retired = count(&msgs, |m| matches!(m, ServerMessage::WorkerRetired { .. }));

        assert!(ups > 0);
        assert_eq!(downs, ups);
        assert_eq!(retired, downs);
        assert!(sim.statistics().peak_workers > baseline);
        assert_eq!(sim.pool().active_count(), baseline);
        assert_eq!(sim.pool().len(), baseline);
    }

    #[test]
    fn invariante_rota_no_pierde_la_telemetria_del_tick() {
        let cfg = SimConfig::default().merge(&scenario()).unwrap();
        let mut sim = Simulation::new(cfg, &settings(), 7);
        sim.stats.arrived += 1;

        // el primer job llega a los 500ms
        let mut messages = Vec::new();
        let err = sim.tick(500, &mut messages).unwrap_err();

        assert!(matches!(err, SimError::InvariantViolation(_)));
        assert!(messages
            .iter()
            .any(|m| matches!(m, ServerMessage::JobArrived { data } if data.job_id == 1)));
    }

    /* ----- handle con driver ----- */

    #[tokio::test(start_paused = true)]
    async fn start_y_stop_inmediato_emite_un_marcador_de_cada_uno() {
        let engine = engine();
        let mut rx = engine.subscribe();

        assert_eq!(engine.run_status(), RunStatus::Idle);
        engine.start(ConfigOverrides::default()).unwrap();
        assert_eq!(engine.run_status(), RunStatus::Running);
        assert!(matches!(engine.stop(), StopOutcome::Stopped(_)));
        assert_eq!(engine.run_status(), RunStatus::Idle);

        assert_eq!(next_message(&mut rx).await, Some(ServerMessage::SimulationStart));
        assert!(matches!(
            next_message(&mut rx).await,
            Some(ServerMessage::SimulationParameters { .. })
        ));
        assert!(matches!(
            next_message(&mut rx).await,
            Some(ServerMessage::Statistics { .. })
        ));
        assert_eq!(
            next_message(&mut rx).await,
            Some(ServerMessage::SimulationStopped)
        );

        // nada más de esa corrida después del marcador
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn start_mientras_corre_devuelve_already_running() {
        let engine = engine();
        let first = engine.start(scenario()).unwrap();

        let err = engine
            .start(ConfigOverrides {
                job_count: Some(999.0),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, SimError::AlreadyRunning);

        let inner = engine.lock();
        let active = inner.active.as_ref().unwrap();
        assert_eq!(active.sim.config(), &first);
        assert_eq!(active.sim.config().job_count, 10);
        drop(inner);

        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn config_invalida_no_arranca() {
        let engine = engine();
        let mut rx = engine.subscribe();

        let err = engine
            .start(ConfigOverrides {
                max_queue: Some(0.0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
        assert_eq!(engine.run_status(), RunStatus::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_sin_corrida_es_no_op() {
        let engine = engine();
        let mut rx = engine.subscribe();
        assert_eq!(engine.stop(), StopOutcome::WasIdle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn corrida_termina_sola_y_vuelve_a_idle() {
        let engine = engine();
        let mut rx = engine.subscribe();
        engine.start(scenario()).unwrap();

        assert_eq!(next_message(&mut rx).await, Some(ServerMessage::SimulationStart));
        match next_message(&mut rx).await {
            Some(ServerMessage::SimulationParameters { data }) => assert_eq!(data.job_count, 10),
            other => panic!("esperaba parámetros, llegó {other:?}"),
        }

        let mut statistics = None;
        let ended = tokio::time::timeout(Duration::from_secs(600), async {
            while let Some(msg) = next_message(&mut rx).await {
                match msg {
                    ServerMessage::Statistics { data } => statistics = Some(data),
                    ServerMessage::SimulationEnd => return true,
                    ServerMessage::SimulationStopped | ServerMessage::Error { .. } => return false,
                    _ => {}
                }
            }
            false
        })
        .await
        .unwrap();

        assert!(ended);
        let statistics = statistics.unwrap();
        assert_eq!(statistics.completed + statistics.dropped, 10);
        assert_eq!(engine.run_status(), RunStatus::Idle);

        // se puede volver a arrancar
        engine.start(ConfigOverrides::default()).unwrap();
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn invariante_rota_emite_error_y_vuelve_a_idle() {
        let engine = engine();
        let mut rx = engine.subscribe();
        engine.start(scenario()).unwrap();
        {
            let mut inner = engine.lock();
            let run = inner.active.as_mut().unwrap();
            run.sim.stats.arrived += 1;
        }

        assert_eq!(next_message(&mut rx).await, Some(ServerMessage::SimulationStart));
        assert!(matches!(
            next_message(&mut rx).await,
            Some(ServerMessage::SimulationParameters { .. })
        ));

        let mut rest = Vec::new();
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(60), next_message(&mut rx))
                .await
                .unwrap()
                .unwrap();
            let is_error = matches!(msg, ServerMessage::Error { .. });
            rest.push(msg);
            if is_error {
                break;
            }
        }

        match rest.last() {
            Some(ServerMessage::Error { error }) => {
                assert!(error.contains("contadores inconsistentes"), "{error}")
            }
            other => panic!("esperaba error, llegó {other:?}"),
        }
        // el error es el marcador: ni estadísticas ni fin
        assert!(rest.iter().all(|m| !matches!(
            m,
            ServerMessage::Statistics { .. } | ServerMessage::SimulationEnd
        )));
        assert_eq!(engine.run_status(), RunStatus::Idle);

        // nada más de esa corrida y se puede volver a arrancar
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        engine.start(ConfigOverrides::default()).unwrap();
        assert_eq!(engine.run_status(), RunStatus::Running);
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_con_trabajos_emite_job_removed_antes_de_las_estadisticas() {
        let engine = engine();
        let mut rx = engine.subscribe();
        engine.start(scenario()).unwrap();
        // 1s real = 10s simulados: llegaron los diez y quedan en cola o imprimiéndose
        tokio::time::sleep(Duration::from_secs(1)).await;

        let statistics = match engine.stop() {
            StopOutcome::Stopped(statistics) => statistics,
            other => panic!("esperaba stop, llegó {other:?}"),
        };

        assert!(statistics.removed > 0);
        let mut removed = 0u64;
        loop {
            match next_message(&mut rx).await {
                Some(ServerMessage::JobRemoved { .. }) => removed += 1,
                Some(ServerMessage::Statistics { .. }) => break,
                Some(_) => {}
                None => panic!("canal cerrado"),
            }
        }
        assert_eq!(removed, statistics.removed);
        assert_eq!(
            next_message(&mut rx).await,
            Some(ServerMessage::SimulationStopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn status_en_corrida_trae_snapshot() {
        let engine = engine();
        engine.start(scenario()).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        match engine.status() {
            ServerMessage::Status {
                status: RunStatus::Running,
                data: Some(snap),
            } => assert!(snap.sim_time_ms > 0),
            other => panic!("status inesperado: {other:?}"),
        }
        engine.stop();
        assert_eq!(engine.status(), idle_status());
    }
}
