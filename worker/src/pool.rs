use common::protocol::WorkerStatistics;
use common::{Job, JobQueue, PaperTray, SimConfig, WorkerId};
use tracing::{debug, info};

use crate::printer::{Worker, WorkerEvent};

/// Resultado de pedirle al pool que se achique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    /// Había una impresora libre y se sacó en el acto.
    Removed(WorkerId),
    /// Todas ocupadas: esta se va cuando termine su trabajo actual.
    Marked(WorkerId),
}

/// Conjunto de impresoras de una corrida.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Worker>,
    next_id: WorkerId,
    peak: usize,
    // estadísticas de las que ya se fueron
    retired: Vec<WorkerStatistics>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            next_id: 1,
            peak: 0,
            retired: Vec::new(),
        }
    }

    pub fn with_workers(count: u32) -> Self {
        let mut pool = Self::new();
        for _ in 0..count {
            pool.spawn();
        }
        pool
    }

    /// Agrega una impresora nueva y devuelve su id (monotónico).
    pub fn spawn(&mut self) -> WorkerId {
        let id = self.next_id;
        self.next_id += 1;
        self.workers.push(Worker::new(id));
        self.peak = self.peak.max(self.active_count());
        debug!("impresora {} agregada al pool", id);
        id
    }

    /// Saca la impresora libre más nueva o, si no hay libres, marca para
    /// retiro la ocupada más nueva que no esté ya marcada.
    pub fn retire_one(&mut self) -> Option<Retirement> {
        if let Some(pos) = self
            .workers
            .iter()
            .rposition(|w| w.is_idle() && !w.is_retiring())
        {
            let worker = self.workers.remove(pos);
            self.retired.push(worker.statistics());
            debug!("impresora {} retirada (estaba libre)", worker.id());
            return Some(Retirement::Removed(worker.id()));
        }

        let worker = self.workers.iter_mut().rev().find(|w| !w.is_retiring())?;
        worker.mark_retiring();
        debug!(
            "impresora {} marcada para retiro al terminar su trabajo",
            worker.id()
        );
        Some(Retirement::Marked(worker.id()))
    }

    /// Impresoras que siguen en servicio (no cuenta las marcadas para retiro).
    pub fn active_count(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_retiring()).count()
    }

    /// Total incluyendo las que se están retirando.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn busy_count(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_idle()).count()
    }

    /// Trabajos en manos de alguna impresora (esperando papel o imprimiendo).
    pub fn in_flight(&self) -> usize {
        self.workers.iter().filter_map(|w| w.held_job()).count()
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Avanza todas las impresoras un tick, en orden de id.
    /// Al final saca las marcadas para retiro que quedaron libres.
    pub fn step(
        &mut self,
        now_ms: u64,
        step_ms: u64,
        queue: &mut JobQueue,
        tray: &mut PaperTray,
        config: &SimConfig,
    ) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        for worker in self.workers.iter_mut() {
            worker.step(now_ms, step_ms, queue, tray, config, &mut events);
        }

        let retired = &mut self.retired;
        self.workers.retain(|w| {
            if w.is_retiring() && w.is_idle() {
                retired.push(w.statistics());
                events.push(WorkerEvent::Retired { worker_id: w.id() });
                false
            } else {
                true
            }
        });

        events
    }

    /// Corta todo (stop): vacía el pool y devuelve los trabajos que quedaron
    /// a medias junto con la impresora que los tenía.
    pub fn abandon_all(&mut self) -> Vec<(WorkerId, Job)> {
        let mut abandoned = Vec::new();
        for mut worker in self.workers.drain(..) {
            if let Some(job) = worker.abandon() {
                abandoned.push((worker.id(), job));
            }
            self.retired.push(worker.statistics());
        }
        if !abandoned.is_empty() {
            info!("se abandonaron {} trabajos en impresión", abandoned.len());
        }
        abandoned
    }

    /// Cifras por impresora, vivas y retiradas, ordenadas por id.
    pub fn statistics(&self) -> Vec<WorkerStatistics> {
        let mut all: Vec<WorkerStatistics> = self
            .retired
            .iter()
            .cloned()
            .chain(self.workers.iter().map(|w| w.statistics()))
            .collect();
        all.sort_by_key(|s| s.worker_id);
        all
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}
