use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

/// Cuenta regresiva de inactividad de un solo disparo, propiedad de una sesión.
///
/// La tarea que duerme nunca toca el estado de la sesión: al despertar envía un
/// mensaje marcado con la generación con que se armó. El dueño llama a
/// [`fire`](Self::fire) con esa generación y solo actúa si devuelve `true`, así
/// que el mensaje de un timer cancelado o reemplazado se ignora aunque ya
/// estuviera encolado.
#[derive(Debug)]
pub struct IdleTimer {
    timeout: Duration,
    generation: u64,
    armed: bool,
    sleeper: Option<JoinHandle<()>>,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            generation: 0,
            armed: false,
            sleeper: None,
        }
    }

    /// Inicia una cuenta nueva, reemplazando la activa. Devuelve su generación.
    pub fn arm<M>(
        &mut self,
        mailbox: mpsc::WeakSender<M>,
        expired: impl FnOnce(u64) -> M + Send + 'static,
    ) -> u64
    where
        M: Send + 'static,
    {
        self.stop_sleeper();
        self.generation += 1;
        self.armed = true;

        let generation = self.generation;
        let timeout = self.timeout;
        self.sleeper = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(mailbox) = mailbox.upgrade() {
                let _ = mailbox.send(expired(generation)).await;
            }
        }));

        debug!(generation, ?timeout, "⏲️ Timer de inactividad armado");
        generation
    }

    /// Detiene la cuenta activa sin dispararla.
    pub fn cancel(&mut self) {
        if self.armed {
            self.armed = false;
            self.generation += 1;
            debug!(generation = self.generation, "⏲️ Timer de inactividad cancelado");
        }
        self.stop_sleeper();
    }

    /// Consume un aviso de expiración. `true` solo para la generación activa y una única vez.
    pub fn fire(&mut self, generation: u64) -> bool {
        if !self.armed || generation != self.generation {
            return false;
        }
        self.armed = false;
        self.sleeper = None;
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn stop_sleeper(&mut self) {
        if let Some(sleeper) = self.sleeper.take() {
            sleeper.abort();
        }
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.stop_sleeper();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_timeout() {
        let (tx, mut rx) = mpsc::channel::<u64>(4);
        let mut timer = IdleTimer::new(Duration::from_secs(60));

        let generation = timer.arm(tx.downgrade(), |g| g);
        let received = rx.recv().await.unwrap();

        assert_eq!(received, generation);
        assert!(timer.fire(received));
        assert!(!timer.is_armed());
        assert!(!timer.fire(received), "a timer fires at most once");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_posts() {
        let (tx, mut rx) = mpsc::channel::<u64>(4);
        let mut timer = IdleTimer::new(Duration::from_secs(60));

        timer.arm(tx.downgrade(), |g| g);
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(rx.try_recv().is_err());
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_ignored() {
        let (tx, mut rx) = mpsc::channel::<u64>(4);
        let mut timer = IdleTimer::new(Duration::from_secs(10));

        let first = timer.arm(tx.downgrade(), |g| g);
        // Simula una expiración enviada antes de que llegara la cancelación
        tx.send(first).await.unwrap();
        timer.cancel();

        let stale = rx.recv().await.unwrap();
        assert!(!timer.fire(stale));

        let second = timer.arm(tx.downgrade(), |g| g);
        assert_ne!(first, second);
        assert!(!timer.fire(first));
        assert!(timer.fire(rx.recv().await.unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_the_live_countdown() {
        let (tx, mut rx) = mpsc::channel::<u64>(4);
        let mut timer = IdleTimer::new(Duration::from_secs(30));

        timer.arm(tx.downgrade(), |g| g);
        tokio::time::sleep(Duration::from_secs(20)).await;
        let second = timer.arm(tx.downgrade(), |g| g);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err(), "first countdown must not fire");

        assert_eq!(rx.recv().await, Some(second));
    }
}
