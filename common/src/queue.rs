use std::collections::VecDeque;

use crate::job::Job;

/// Error de encolado: la cola está llena y el trabajo se devuelve al llamador.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFull(pub Job);

/// Error de desencolado sobre una cola vacía.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEmpty;

/// Cola FIFO acotada de trabajos. Nunca supera `capacity` elementos.
#[derive(Debug, Clone)]
pub struct JobQueue {
    items: VecDeque<Job>,
    capacity: usize,
    peak: usize,
}

impl JobQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            peak: 0,
        }
    }

    pub fn enqueue(&mut self, job: Job) -> Result<(), QueueFull> {
        if self.items.len() >= self.capacity {
            return Err(QueueFull(job));
        }
        self.items.push_back(job);
        self.peak = self.peak.max(self.items.len());
        Ok(())
    }

    pub fn dequeue(&mut self) -> Result<Job, QueueEmpty> {
        self.items.pop_front().ok_or(QueueEmpty)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Profundidad máxima observada desde que se creó la cola.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Vacía la cola devolviendo los trabajos pendientes en orden.
    pub fn drain(&mut self) -> Vec<Job> {
        self.items.drain(..).collect()
    }
}
