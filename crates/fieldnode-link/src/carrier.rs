//! Carrier event handling and the one-shot readiness signal

use std::sync::Arc;

use fieldnode_core::CarrierEvent;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Create a readiness signal
/// The handler side may be cloned freely; the wait side is consumed once.
pub(crate) fn readiness_signal() -> (CarrierEventHandler, ReadinessWait) {
    let (tx, rx) = oneshot::channel();
    let handler = CarrierEventHandler {
        ready: Arc::new(Mutex::new(Some(tx))),
    };
    (handler, ReadinessWait { rx })
}

/// Callback target for the carrier-management service
///
/// Every event is logged. Only `Ready` has an effect: it sets the readiness
/// signal, at most once.
#[derive(Clone, Debug)]
pub struct CarrierEventHandler {
    ready: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl CarrierEventHandler {
    /// React to one carrier event
    pub fn handle(&self, event: CarrierEvent) {
        match event {
            CarrierEvent::InitDone => ignored(event),
            CarrierEvent::Connect => ignored(event),
            CarrierEvent::Disconnect => ignored(event),
            CarrierEvent::Ready => {
                tracing::info!(event = %event, "{}", event);
                self.signal_ready();
            }
            CarrierEvent::FotaStart => ignored(event),
            CarrierEvent::Reboot => ignored(event),
        }
    }

    /// Has `Ready` been delivered?
    pub fn is_signalled(&self) -> bool {
        self.ready.lock().is_none()
    }

    fn signal_ready(&self) {
        let Some(tx) = self.ready.lock().take() else {
            tracing::debug!("readiness already signalled, ignoring repeated Ready");
            return;
        };
        // Receiver is gone only if bring-up is no longer waiting
        if tx.send(()).is_err() {
            tracing::debug!("readiness signalled with no waiter");
        }
    }
}

fn ignored(event: CarrierEvent) {
    tracing::debug!(event = %event, "{}", event);
}

/// Consumer side of the readiness signal
#[derive(Debug)]
pub(crate) struct ReadinessWait {
    rx: oneshot::Receiver<()>,
}

impl ReadinessWait {
    /// Wait for `Ready`, with no timeout
    /// Errors only if every handler was dropped without signalling.
    pub(crate) async fn wait(self) -> Result<(), oneshot::error::RecvError> {
        self.rx.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ready_sets_signal() {
        let (handler, wait) = readiness_signal();
        assert!(!handler.is_signalled());

        handler.handle(CarrierEvent::Ready);
        assert!(handler.is_signalled());
        assert!(wait.wait().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_events_are_ignored() {
        let (handler, wait) = readiness_signal();

        for event in CarrierEvent::ALL {
            if event != CarrierEvent::Ready {
                handler.handle(event);
            }
        }
        assert!(!handler.is_signalled());

        let result = tokio::time::timeout(Duration::from_secs(60), wait.wait()).await;
        assert!(result.is_err(), "signal must stay unset without Ready");
    }

    #[tokio::test]
    async fn test_repeated_ready_is_noop() {
        let (handler, wait) = readiness_signal();
        let other = handler.clone();

        handler.handle(CarrierEvent::Ready);
        other.handle(CarrierEvent::Ready);
        handler.handle(CarrierEvent::Disconnect);

        assert!(other.is_signalled());
        assert!(wait.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_ready_from_foreign_thread() {
        let (handler, wait) = readiness_signal();

        let producer = handler.clone();
        let thread = std::thread::spawn(move || {
            producer.handle(CarrierEvent::InitDone);
            producer.handle(CarrierEvent::Connect);
            producer.handle(CarrierEvent::Ready);
        });

        assert!(wait.wait().await.is_ok());
        thread.join().unwrap();
    }

    #[tokio::test]
    async fn test_all_handlers_dropped() {
        let (handler, wait) = readiness_signal();
        drop(handler);
        assert!(wait.wait().await.is_err());
    }

    /// Records the level of every event it sees
    struct LevelLog(Arc<Mutex<Vec<tracing::Level>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LevelLog {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.lock().push(*event.metadata().level());
        }
    }

    fn levels_of(handler: &CarrierEventHandler, event: CarrierEvent) -> Vec<tracing::Level> {
        use tracing_subscriber::layer::SubscriberExt;

        let levels = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(LevelLog(Arc::clone(&levels)));
        tracing::subscriber::with_default(subscriber, || handler.handle(event));
        let seen = levels.lock().clone();
        seen
    }

    #[test]
    fn test_ignored_events_log_at_debug() {
        let (handler, _wait) = readiness_signal();

        for event in CarrierEvent::ALL {
            if event != CarrierEvent::Ready {
                assert_eq!(levels_of(&handler, event), vec![tracing::Level::DEBUG], "{}", event);
            }
        }
        assert_eq!(
            levels_of(&handler, CarrierEvent::Ready),
            vec![tracing::Level::INFO]
        );
    }
}
