use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Buzón de un solo hueco entre captura e inferencia: el frame más nuevo
/// reemplaza al que no se consumió. Nunca hay cola.
pub fn frame_mailbox<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let (tx, rx) = bounded(1);
    let shared = Arc::new(MailboxStats::default());

    (
        MailboxSender {
            tx,
            drain: rx.clone(),
            shared: Arc::clone(&shared),
        },
        MailboxReceiver { rx, shared },
    )
}

#[derive(Debug, Default)]
struct MailboxStats {
    dropped: AtomicU64,
    receiver_closed: AtomicBool,
}

/// El consumidor se ha cerrado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxClosed;

pub struct MailboxSender<T> {
    tx: Sender<T>,
    /// Permite al productor descartar el frame pendiente
    drain: Receiver<T>,
    shared: Arc<MailboxStats>,
}

impl<T> MailboxSender<T> {
    /// Publica un frame; si había uno sin consumir se descarta
    pub fn publish(&self, item: T) -> Result<(), MailboxClosed> {
        if self.shared.receiver_closed.load(Ordering::Acquire) {
            return Err(MailboxClosed);
        }

        let mut item = item;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(back)) => {
                    if self.drain.try_recv().is_ok() {
                        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => return Err(MailboxClosed),
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

pub struct MailboxReceiver<T> {
    rx: Receiver<T>,
    shared: Arc<MailboxStats>,
}

impl<T> MailboxReceiver<T> {
    /// Bloquea hasta el próximo frame; error cuando el productor terminó
    pub fn recv(&self) -> Result<T, RecvError> {
        self.rx.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Frames descartados por llegar antes de que se consumiera el anterior
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Drop for MailboxReceiver<T> {
    fn drop(&mut self) {
        self.shared.receiver_closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_frame_wins() {
        let (tx, rx) = frame_mailbox();
        tx.publish(1).unwrap();
        tx.publish(2).unwrap();
        tx.publish(3).unwrap();

        assert_eq!(rx.try_recv(), Some(3));
        assert_eq!(rx.try_recv(), None);
        assert_eq!(rx.dropped(), 2);
    }

    #[test]
    fn test_consumed_frames_are_not_dropped() {
        let (tx, rx) = frame_mailbox();
        for i in 0..5 {
            tx.publish(i).unwrap();
            assert_eq!(rx.recv().unwrap(), i);
        }
        assert_eq!(tx.dropped(), 0);
    }

    #[test]
    fn test_producer_exit_disconnects() {
        let (tx, rx) = frame_mailbox();
        tx.publish(7).unwrap();
        drop(tx);

        // El último frame sigue disponible antes de la desconexión
        assert_eq!(rx.recv().unwrap(), 7);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_consumer_exit_closes_mailbox() {
        let (tx, rx) = frame_mailbox::<u32>();
        drop(rx);
        assert_eq!(tx.publish(1), Err(MailboxClosed));
    }

    #[test]
    fn test_threaded_handoff() {
        let (tx, rx) = frame_mailbox();
        let producer = std::thread::spawn(move || {
            for i in 0..100u32 {
                if tx.publish(i).is_err() {
                    break;
                }
            }
        });

        let mut last = None;
        while let Ok(v) = rx.recv_timeout(Duration::from_secs(1)) {
            if let Some(prev) = last {
                assert!(v > prev);
            }
            last = Some(v);
        }
        producer.join().unwrap();
        assert_eq!(last, Some(99));
    }
}
