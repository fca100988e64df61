use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, info};

use super::track::Track;

/// Motivo por el que [`PlaybackQueue::try_push`] rechazó un track. La cola no cambia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueRejected {
    #[error("queue is full")]
    Full,
    #[error("queue is closed")]
    Closed,
}

/// Cola FIFO acotada de tracks pendientes más el track en reproducción.
///
/// `items` es el orden de reproducción. El listado es `current` seguido de
/// `items`, así que nunca es más corto que la cola pendiente. Solo los tracks
/// pendientes cuentan contra la capacidad.
#[derive(Debug)]
pub struct PlaybackQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    capacity: usize,
    closed: bool,
}

impl PlaybackQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            capacity,
            closed: false,
        }
    }

    /// Cola que rechaza todo hasta que se llame a [`reopen`](Self::reopen).
    pub fn closed(capacity: usize) -> Self {
        Self {
            closed: true,
            ..Self::new(capacity)
        }
    }

    /// Agrega un track y devuelve su fila (base 0) en el listado.
    pub fn try_push(&mut self, track: Track) -> Result<usize, QueueRejected> {
        if self.closed {
            return Err(QueueRejected::Closed);
        }
        if self.items.len() >= self.capacity {
            return Err(QueueRejected::Full);
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
        Ok(self.snapshot_len() - 1)
    }

    /// Obtiene el siguiente track (FIFO) y lo marca como actual
    pub fn advance(&mut self) -> Option<Track> {
        if self.closed {
            return None;
        }
        let next = self.items.pop_front()?;
        debug!("➡️ Siguiente en cola (FIFO): {}", next.title());
        self.current = Some(next.clone());
        Some(next)
    }

    /// Quita el track actual del listado cuando termina su stream.
    pub fn finish_current(&mut self) -> Option<Track> {
        self.current.take()
    }

    /// Limpia los tracks pendientes, sin tocar el actual
    pub fn clear_pending(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        info!("🗑️ Cola limpiada ({} pendientes eliminados)", removed);
        removed
    }

    /// Vacía la cola y rechaza tracks nuevos hasta [`reopen`](Self::reopen).
    pub fn close(&mut self) {
        self.items.clear();
        self.current = None;
        self.closed = true;
    }

    pub fn reopen(&mut self) {
        self.items.clear();
        self.current = None;
        self.closed = false;
    }

    /// Copia del listado: primero el track actual, luego los pendientes.
    pub fn snapshot(&self) -> Vec<Track> {
        self.current
            .iter()
            .chain(self.items.iter())
            .cloned()
            .collect()
    }

    pub fn snapshot_len(&self) -> usize {
        self.items.len() + usize::from(self.current.is_some())
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Cantidad de tracks pendientes, sin contar el actual.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
