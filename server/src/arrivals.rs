use common::{Job, JobId, SimConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Generador de trabajos: el k-ésimo llega en `k * jobArrivalTime`.
/// El tamaño de cada uno sale uniforme de `[minPapers, maxPapers]`.
#[derive(Debug, Clone)]
pub struct ArrivalProcess {
    interval_ms: u64,
    total: u32,
    generated: u32,
    min_papers: u32,
    max_papers: u32,
    rng: ChaCha8Rng,
}

impl ArrivalProcess {
    pub fn new(config: &SimConfig, seed: u64) -> Self {
        Self {
            interval_ms: config.arrival_interval_ms(),
            total: config.job_count,
            generated: 0,
            min_papers: config.min_papers,
            max_papers: config.max_papers.max(config.min_papers),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Todos los trabajos cuya hora de llegada ya pasó a `now_ms`.
    /// Nunca espera por espacio en la cola: eso lo resuelve quien encola.
    pub fn due(&mut self, now_ms: u64) -> Vec<Job> {
        let mut jobs = Vec::new();
        while !self.is_exhausted() {
            let next = self.generated as u64 + 1;
            let at = next * self.interval_ms;
            if at > now_ms {
                break;
            }
            let papers = self.rng.gen_range(self.min_papers..=self.max_papers);
            jobs.push(Job::new(next as JobId, papers, at));
            self.generated += 1;
        }
        jobs
    }

    pub fn is_exhausted(&self) -> bool {
        self.generated >= self.total
    }
}
