use common::{Job, JobId, JobQueue, PaperTray, SimConfig, SimError, WorkerId};
use tracing::debug;

/// Lo que pasa dentro de una impresora durante un tick.
/// El engine lo convierte en telemetría y en estadísticas.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Tomó un trabajo de la cola.
    Claimed {
        worker_id: WorkerId,
        job_id: JobId,
        papers: u32,
        waited_ms: u64,
        queue_depth: usize,
    },
    /// Primer intento fallido de una racha sin papel.
    Stalled {
        worker_id: WorkerId,
        job_id: JobId,
        needed: u32,
        available: f64,
    },
    /// Consiguió el papel y empezó a imprimir.
    Started { worker_id: WorkerId, job_id: JobId, papers: u32 },
    /// Terminó de imprimir; el job ya tiene todas sus marcas de tiempo.
    Completed { worker_id: WorkerId, job: Job },
    /// Se retiró del pool (scale-down).
    Retired { worker_id: WorkerId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerState {
    Idle,
    /// Tiene un trabajo pero la bandeja no alcanza; reintenta cada tick.
    WaitingPaper(Job),
    Printing { job: Job, remaining_ms: u64 },
}

/// Una impresora. Procesa un trabajo por vez: cola → papel → impresión.
#[derive(Debug, Clone)]
pub struct Worker {
    id: WorkerId,
    state: WorkerState,
    retiring: bool,
    stalled: bool,

    // contadores para las estadísticas de la corrida
    jobs_printed: u64,
    papers_printed: u64,
    busy_ms: u64,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            state: WorkerState::Idle,
            retiring: false,
            stalled: false,
            jobs_printed: 0,
            papers_printed: 0,
            busy_ms: 0,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, WorkerState::Idle)
    }

    pub fn is_retiring(&self) -> bool {
        self.retiring
    }

    pub fn mark_retiring(&mut self) {
        self.retiring = true;
    }

    pub fn held_job(&self) -> Option<&Job> {
        match &self.state {
            WorkerState::Idle => None,
            WorkerState::WaitingPaper(job) => Some(job),
            WorkerState::Printing { job, .. } => Some(job),
        }
    }

    /// Suelta el trabajo que tenga (stop). No cuenta como impreso.
    pub fn abandon(&mut self) -> Option<Job> {
        match std::mem::replace(&mut self.state, WorkerState::Idle) {
            WorkerState::Idle => None,
            WorkerState::WaitingPaper(job) => Some(job),
            WorkerState::Printing { job, .. } => Some(job),
        }
    }

    pub fn statistics(&self) -> common::protocol::WorkerStatistics {
        common::protocol::WorkerStatistics {
            worker_id: self.id,
            jobs_printed: self.jobs_printed,
            papers_printed: self.papers_printed,
            busy_ms: self.busy_ms,
        }
    }

    /// Avanza la impresora un tick que termina en `now_ms` y dura `step_ms`.
    ///
    /// Orden dentro del tick:
    /// 1. si estaba imprimiendo, descuenta el tiempo y puede terminar;
    /// 2. si quedó libre (y no se está retirando), toma el siguiente de la cola;
    /// 3. si tiene trabajo esperando papel, intenta consumirlo.
    pub fn step(
        &mut self,
        now_ms: u64,
        step_ms: u64,
        queue: &mut JobQueue,
        tray: &mut PaperTray,
        config: &SimConfig,
        events: &mut Vec<WorkerEvent>,
    ) {
        self.advance_printing(now_ms, step_ms, events);

        if self.is_idle() && !self.retiring {
            if let Ok(job) = queue.dequeue() {
                debug!("impresora {} toma el job {}", self.id, job.id);
                let enqueued_at = job.enqueued_at_ms.unwrap_or(job.created_at_ms);
                events.push(WorkerEvent::Claimed {
                    worker_id: self.id,
                    job_id: job.id,
                    papers: job.papers,
                    waited_ms: now_ms.saturating_sub(enqueued_at),
                    queue_depth: queue.len(),
                });
                self.state = WorkerState::WaitingPaper(job);
            }
        }

        self.try_start(now_ms, tray, config, events);
    }

    fn advance_printing(&mut self, now_ms: u64, step_ms: u64, events: &mut Vec<WorkerEvent>) {
        let WorkerState::Printing { remaining_ms, .. } = &mut self.state else {
            return;
        };

        if *remaining_ms > step_ms {
            *remaining_ms -= step_ms;
            self.busy_ms += step_ms;
            return;
        }

        // Terminó dentro de este tick: la marca es el instante exacto.
        let done_at = now_ms.saturating_sub(step_ms) + *remaining_ms;
        self.busy_ms += *remaining_ms;

        if let WorkerState::Printing { mut job, .. } =
            std::mem::replace(&mut self.state, WorkerState::Idle)
        {
            job.completed_at_ms = Some(done_at);
            self.jobs_printed += 1;
            self.papers_printed += job.papers as u64;
            debug!(
                "impresora {} terminó el job {} ({} páginas) en t={}ms",
                self.id, job.id, job.papers, done_at
            );
            events.push(WorkerEvent::Completed {
                worker_id: self.id,
                job,
            });
        }
    }

    fn try_start(
        &mut self,
        now_ms: u64,
        tray: &mut PaperTray,
        config: &SimConfig,
        events: &mut Vec<WorkerEvent>,
    ) {
        let WorkerState::WaitingPaper(job) = &self.state else {
            return;
        };

        match tray.try_consume(job.papers) {
            Ok(()) => {
                self.stalled = false;
                if let WorkerState::WaitingPaper(mut job) =
                    std::mem::replace(&mut self.state, WorkerState::Idle)
                {
                    job.started_at_ms = Some(now_ms);
                    let remaining_ms = config.service_time_ms(job.papers).max(1);
                    events.push(WorkerEvent::Started {
                        worker_id: self.id,
                        job_id: job.id,
                        papers: job.papers,
                    });
                    self.state = WorkerState::Printing { job, remaining_ms };
                }
            }
            Err(SimError::InsufficientResource { needed, available }) => {
                // Sólo avisamos una vez por racha; se reintenta el próximo tick.
                if !self.stalled {
                    self.stalled = true;
                    events.push(WorkerEvent::Stalled {
                        worker_id: self.id,
                        job_id: job.id,
                        needed,
                        available,
                    });
                }
            }
            Err(other) => {
                debug!("impresora {}: error inesperado de la bandeja: {}", self.id, other);
            }
        }
    }
}
