use common::protocol::WorkerStatistics;
use common::{Job, RunStatistics};

/// Acumulador de estadísticas de una corrida.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub arrived: u64,
    pub completed: u64,
    pub dropped: u64,
    pub removed: u64,
    pub paper_used: u64,
    pub paper_refilled: f64,
    pub paper_stalls: u64,

    last_arrival_ms: u64,
    inter_arrival_sum_ms: u64,

    // profundidad de cola ponderada por tiempo
    queue_area: f64,
    observed_ms: u64,

    wait_sum_ms: f64,
    wait_count: u64,
    system_sum_ms: f64,
    system_sq_sum: f64,
    service_sum_ms: f64,
}

impl RunStats {
    /// Cuenta una llegada en `at_ms` y devuelve el tiempo desde la anterior.
    pub fn record_arrival(&mut self, at_ms: u64) -> u64 {
        let gap = at_ms.saturating_sub(self.last_arrival_ms);
        self.arrived += 1;
        self.last_arrival_ms = at_ms;
        self.inter_arrival_sum_ms += gap;
        gap
    }

    pub fn record_drop(&mut self) {
        self.dropped += 1;
    }

    pub fn record_removed(&mut self, count: usize) {
        self.removed += count as u64;
    }

    pub fn record_refill(&mut self, amount: f64) {
        self.paper_refilled += amount;
    }

    pub fn record_stall(&mut self) {
        self.paper_stalls += 1;
    }

    /// Papel tomado de la bandeja al arrancar una impresión.
    pub fn record_start(&mut self, papers: u32) {
        self.paper_used += papers as u64;
    }

    pub fn record_completion(&mut self, job: &Job) {
        self.completed += 1;
        if let Some(wait) = job.queue_wait_ms() {
            self.wait_sum_ms += wait as f64;
            self.wait_count += 1;
        }
        if let Some(system) = job.system_time_ms() {
            let system = system as f64;
            self.system_sum_ms += system;
            self.system_sq_sum += system * system;
        }
        if let Some(service) = job.service_time_ms() {
            self.service_sum_ms += service as f64;
        }
    }

    /// Registra que la cola tuvo `depth` trabajos durante `step_ms`.
    pub fn sample_queue(&mut self, depth: usize, step_ms: u64) {
        self.queue_area += depth as f64 * step_ms as f64;
        self.observed_ms += step_ms;
    }

    fn mean(sum: f64, n: u64) -> f64 {
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    pub fn finish(
        &self,
        peak_queue_depth: usize,
        peak_workers: usize,
        duration_ms: u64,
        workers: Vec<WorkerStatistics>,
    ) -> RunStatistics {
        let avg_system = Self::mean(self.system_sum_ms, self.completed);
        // desvío poblacional
        let variance = Self::mean(self.system_sq_sum, self.completed) - avg_system * avg_system;

        RunStatistics {
            arrived: self.arrived,
            completed: self.completed,
            dropped: self.dropped,
            removed: self.removed,
            peak_queue_depth,
            avg_queue_depth: if self.observed_ms == 0 {
                0.0
            } else {
                self.queue_area / self.observed_ms as f64
            },
            avg_inter_arrival_ms: Self::mean(self.inter_arrival_sum_ms as f64, self.arrived),
            avg_queue_wait_ms: Self::mean(self.wait_sum_ms, self.wait_count),
            avg_system_time_ms: avg_system,
            std_system_time_ms: variance.max(0.0).sqrt(),
            avg_service_time_ms: Self::mean(self.service_sum_ms, self.completed),
            paper_used: self.paper_used,
            paper_refilled: self.paper_refilled,
            paper_stalls: self.paper_stalls,
            peak_workers,
            duration_ms,
            workers,
        }
    }
}
