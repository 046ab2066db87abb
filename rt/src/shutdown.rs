use std::sync::Arc;

use tokio::sync::Semaphore;

/// Sends a notification to all consumers *once*, used for shutdown signals.
///
/// - Multi-producer and multi-consumer - clone to get another handle.
/// - Every clone observes a signal at-most-once. If the signal has already
///   been sent, new clones can still observe it once.
/// - Consumers can receive signals that were sent prior to subscribing
///   (unlike [`tokio::sync::broadcast`]).
/// - It is safe to send a signal multiple times.
///
/// The implementation (ab)uses the fact that [`Semaphore::acquire`] on a
/// semaphore with 0 permits only returns once the semaphore has been closed.
/// Closing the semaphore is the signal; an `Err` from `acquire` means the
/// signal was observed.
#[derive(Debug)]
pub struct Shutdown {
    inner: Arc<Semaphore>,
    have_recved: bool,
}

impl Shutdown {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Semaphore::new(0)),
            have_recved: false,
        }
    }

    /// Signal shutdown, waking every consumer currently in [`Shutdown::recv`].
    pub fn send(&self) {
        self.inner.close();
    }

    /// Wait for the shutdown signal.
    ///
    /// NOTE: if this handle has already observed a signal, this future never
    /// resolves again - clone a fresh handle if you need to wait again.
    pub async fn recv(&mut self) {
        if self.have_recved {
            std::future::pending().await
        } else {
            self.inner
                .acquire()
                .await
                .map_err(|_| ())
                .expect_err("semaphore should never hand out a permit");
            self.have_recved = true;
        }
    }

    /// Like [`Shutdown::recv`] but takes ownership, for `'static` futures.
    pub async fn recv_owned(mut self) {
        self.recv().await
    }

    /// Whether a signal has been sent, without consuming it for later `recv`.
    #[must_use]
    pub fn try_recv(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Clone for Shutdown {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            // Every clone gets a fresh chance to observe the signal.
            have_recved: false,
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;

    #[test]
    fn multiple_sends_dont_panic() {
        let shutdown = Shutdown::new();
        shutdown.send();
        shutdown.send();
    }

    #[test]
    fn only_yields_once_per_handle() {
        let shutdown1 = Shutdown::new();
        let mut shutdown2 = shutdown1.clone();

        let mut recv = tokio_test::task::spawn(shutdown2.recv());
        assert_pending!(recv.poll());

        shutdown1.send();

        assert!(recv.is_woken());
        assert_ready!(recv.poll());
        drop(recv);

        // Polling the same handle again should hang forever.
        let mut recv2 = tokio_test::task::spawn(shutdown2.recv());
        assert_pending!(recv2.poll());
        assert_pending!(recv2.poll());

        // A fresh clone gets its own chance.
        let mut shutdown3 = shutdown2.clone();
        let mut recv3 = tokio_test::task::spawn(shutdown3.recv());
        assert_ready!(recv3.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_after_send_is_ok() {
        let shutdown1 = Shutdown::new();
        time::sleep(Duration::from_secs(1)).await;
        shutdown1.send();

        let mut shutdown2 = shutdown1.clone();
        assert!(shutdown2.try_recv());
        time::timeout(Duration::from_nanos(1), shutdown2.recv())
            .await
            .expect("did not finish immediately");
    }
}
