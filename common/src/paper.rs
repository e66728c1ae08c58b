use crate::error::{SimError, SimResult};

/// Bandeja de papel compartida por todas las impresoras.
/// El nivel se guarda como f64 porque la recarga es continua.
#[derive(Debug, Clone)]
pub struct PaperTray {
    level: f64,
    capacity: f64,
    refill_rate: f64,
}

impl PaperTray {
    /// Crea la bandeja llena.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        let capacity = capacity as f64;
        Self {
            level: capacity,
            capacity,
            refill_rate: refill_rate.max(0.0),
        }
    }

    /// Suma `refill_rate * delta_secs` sin pasar la capacidad.
    /// Devuelve lo que efectivamente entró en la bandeja.
    pub fn refill(&mut self, delta_secs: f64) -> f64 {
        if !(delta_secs > 0.0) {
            return 0.0;
        }
        let before = self.level;
        self.level = (self.level + self.refill_rate * delta_secs).min(self.capacity);
        self.level - before
    }

    /// Resta `amount` de una vez o falla dejando el nivel como estaba.
    pub fn try_consume(&mut self, amount: u32) -> SimResult<()> {
        let needed = amount as f64;
        if needed > self.level {
            return Err(SimError::InsufficientResource {
                needed: amount,
                available: self.level,
            });
        }
        self.level -= needed;
        Ok(())
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandeja_empieza_llena() {
        let tray = PaperTray::new(150, 25.0);
        assert_eq!(tray.level(), 150.0);
        assert_eq!(tray.capacity(), 150.0);
    }

    #[test]
    fn recarga_se_recorta_a_la_capacidad() {
        let mut tray = PaperTray::new(50, 25.0);
        tray.try_consume(40).unwrap();

        let added = tray.refill(1.0);
        assert_eq!(added, 25.0);
        assert_eq!(tray.level(), 35.0);

        let added = tray.refill(10.0);
        assert_eq!(added, 15.0);
        assert_eq!(tray.level(), 50.0);
    }

    #[test]
    fn consumo_insuficiente_no_cambia_el_nivel() {
        let mut tray = PaperTray::new(50, 0.0);
        tray.try_consume(45).unwrap();

        let err = tray.try_consume(10).unwrap_err();
        assert_eq!(
            err,
            SimError::InsufficientResource {
                needed: 10,
                available: 5.0
            }
        );
        assert_eq!(tray.level(), 5.0);
    }

    #[test]
    fn nivel_siempre_dentro_de_rango_tras_operaciones_mezcladas() {
        let mut tray = PaperTray::new(60, 13.0);
        for i in 0..200u32 {
            if i % 3 == 0 {
                tray.refill(0.37);
            } else {
                let _ = tray.try_consume(i % 17);
            }
            assert!(tray.level() >= 0.0);
            assert!(tray.level() <= tray.capacity());
        }
    }
}
