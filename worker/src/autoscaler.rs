use common::SimConfig;

/// Cuántos trabajos en cola "banca" cada impresora antes de pedir otra.
/// Con 2/3/4 impresoras da los umbrales 10/15/20.
pub const SCALE_UP_STEP: usize = 5;

/// Tope absoluto de impresoras.
pub const MAX_WORKERS: usize = 5;

/// Con la cola en este nivel o menos se considera que sobra gente.
pub const LOW_WATER: usize = 1;

/// Lo que el autoscaler mira en cada evaluación, tomado al borde del tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingContext {
    pub queue_depth: usize,
    pub workers: usize,
    pub paper_level: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalingDecision {
    Hold,
    ScaleUp { reason: String },
    ScaleDown { reason: String },
}

/// Controlador de tamaño del pool. Evalúa cada `interval_ms` de tiempo simulado
/// y mueve como mucho una impresora por evaluación.
#[derive(Debug, Clone)]
pub struct Autoscaler {
    interval_ms: u64,
    elapsed_ms: u64,
    max_queue: usize,
    min_papers: f64,
    floor: usize,
    cap: usize,
}

impl Autoscaler {
    pub fn new(config: &SimConfig, interval_ms: u64) -> Self {
        let baseline = config.consumer_count as usize;
        let by_paper = (config.paper_capacity / config.max_papers.max(1)) as usize;

        Self {
            interval_ms: interval_ms.max(1),
            elapsed_ms: 0,
            max_queue: config.max_queue as usize,
            min_papers: config.min_papers as f64,
            floor: baseline.max(1),
            cap: by_paper.clamp(baseline, MAX_WORKERS.max(baseline)),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Umbral de cola a partir del cual se agrega una impresora.
    /// Se recorta a `maxQueue - 1` para que sea alcanzable en colas chicas.
    pub fn high_water(&self, workers: usize) -> usize {
        (SCALE_UP_STEP * workers).min(self.max_queue.saturating_sub(1))
    }

    /// Acumula tiempo simulado; devuelve true cuando toca evaluar.
    pub fn due(&mut self, step_ms: u64) -> bool {
        self.elapsed_ms += step_ms;
        if self.elapsed_ms >= self.interval_ms {
            self.elapsed_ms %= self.interval_ms;
            true
        } else {
            false
        }
    }

    pub fn decide(&self, ctx: &ScalingContext) -> ScalingDecision {
        let high_water = self.high_water(ctx.workers);

        if ctx.queue_depth > high_water
            && ctx.paper_level > self.min_papers
            && ctx.workers < self.cap
        {
            return ScalingDecision::ScaleUp {
                reason: format!(
                    "cola {} > umbral {} con {} impresoras",
                    ctx.queue_depth, high_water, ctx.workers
                ),
            };
        }

        if ctx.queue_depth <= LOW_WATER && ctx.workers > self.floor {
            return ScalingDecision::ScaleDown {
                reason: format!(
                    "cola {} <= {} con {} impresoras (base {})",
                    ctx.queue_depth, LOW_WATER, ctx.workers, self.floor
                ),
            };
        }

        ScalingDecision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaler(overrides: impl FnOnce(&mut SimConfig)) -> Autoscaler {
        let mut cfg = SimConfig {
            auto_scaling: true,
            ..Default::default()
        };
        overrides(&mut cfg);
        Autoscaler::new(&cfg, 500)
    }

    #[test]
    fn umbrales_escalonados_y_recortados_por_la_cola() {
        let a = scaler(|c| c.max_queue = 100);
        assert_eq!(a.high_water(2), 10);
        assert_eq!(a.high_water(3), 15);
        assert_eq!(a.high_water(4), 20);

        let chica = scaler(|c| c.max_queue = 8);
        assert_eq!(chica.high_water(2), 7);
    }

    #[test]
    fn cap_depende_de_la_relacion_capacidad_papel() {
        // 150 / 15 = 10, tope 5
        assert_eq!(scaler(|_| {}).cap(), MAX_WORKERS);
        // 50 / 15 = 3
        assert_eq!(scaler(|c| c.paper_capacity = 50).cap(), 3);
        // nunca por debajo de la base
        let a = scaler(|c| {
            c.paper_capacity = 50;
            c.max_papers = 40;
            c.consumer_count = 2;
        });
        assert_eq!(a.cap(), 2);
    }

    #[test]
    fn cola_sostenida_sube_hasta_el_cap() {
        let a = scaler(|c| c.max_queue = 30);
        let mut workers = 2;
        let mut history = vec![workers];

        for _ in 0..10 {
            let ctx = ScalingContext {
                queue_depth: 29,
                workers,
                paper_level: 100.0,
            };
            if let ScalingDecision::ScaleUp { .. } = a.decide(&ctx) {
                workers += 1;
            }
            history.push(workers);
        }

        assert_eq!(workers, a.cap());
        assert!(history.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(&history[..4], &[2, 3, 4, 5]);
    }

    #[test]
    fn sin_papel_no_escala() {
        let a = scaler(|c| c.max_queue = 30);
        let ctx = ScalingContext {
            queue_depth: 29,
            workers: 2,
            paper_level: 5.0, // == minPapers
        };
        assert_eq!(a.decide(&ctx), ScalingDecision::Hold);
    }

    #[test]
    fn cola_vacia_baja_hasta_la_base() {
        let a = scaler(|_| {});
        let down = |workers| {
            a.decide(&ScalingContext {
                queue_depth: 0,
                workers,
                paper_level: 150.0,
            })
        };
        assert!(matches!(down(4), ScalingDecision::ScaleDown { .. }));
        assert_eq!(down(2), ScalingDecision::Hold);
    }

    #[test]
    fn due_respeta_la_cadencia() {
        let mut a = scaler(|_| {});
        let fired: Vec<bool> = (0..10).map(|_| a.due(100)).collect();
        assert_eq!(
            fired,
            vec![false, false, false, false, true, false, false, false, false, true]
        );
    }
}
