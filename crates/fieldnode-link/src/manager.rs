//! Connectivity manager - brings the link up before the application starts

use std::str::FromStr;

use fieldnode_core::{ConnectivityState, FieldnodeError, FieldnodeResult};
use serde::{Deserialize, Serialize};

use crate::carrier::{readiness_signal, CarrierEventHandler, ReadinessWait};
use crate::LinkController;

/// How the link is brought up
/// Strategies are mutually exclusive and fixed at configuration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStrategy {
    /// The link is already up when the application starts
    Automatic,
    /// The carrier service owns the modem and reports readiness through events
    ExternallyManaged,
    /// The application attaches the modem itself
    SelfManaged,
}

impl LinkStrategy {
    /// Strategy selected by the crate's build features
    ///
    /// `auto-connect` wins over `carrier`; with neither enabled the
    /// application manages the link itself. Builds without link control at
    /// all should use `Automatic`.
    pub fn from_build() -> Self {
        if cfg!(feature = "auto-connect") {
            LinkStrategy::Automatic
        } else if cfg!(feature = "carrier") {
            LinkStrategy::ExternallyManaged
        } else {
            LinkStrategy::SelfManaged
        }
    }
}

impl Default for LinkStrategy {
    fn default() -> Self {
        Self::from_build()
    }
}

impl FromStr for LinkStrategy {
    type Err = FieldnodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "automatic" => Ok(LinkStrategy::Automatic),
            "carrier" | "external" | "externally-managed" => Ok(LinkStrategy::ExternallyManaged),
            "lte" | "self" | "self-managed" => Ok(LinkStrategy::SelfManaged),
            other => Err(FieldnodeError::InvalidConfig(format!(
                "unknown link strategy '{}'",
                other
            ))),
        }
    }
}

/// Connectivity manager
///
/// Owns the connectivity state. `bring_up` either leaves it `Connected` or
/// reports a fatal error; there is no degraded state. A fatal error is
/// terminal and every later `bring_up` returns it again.
pub struct ConnectivityManager {
    strategy: LinkStrategy,
    state: ConnectivityState,
    failed: Option<FieldnodeError>,
    controller: Box<dyn LinkController + Send>,
    /// Handler kept until bring-up so callers can fetch copies
    events: Option<CarrierEventHandler>,
    ready: Option<ReadinessWait>,
}

impl ConnectivityManager {
    /// Create a manager for the given strategy
    pub fn new<C>(strategy: LinkStrategy, controller: C) -> Self
    where
        C: LinkController + Send + 'static,
    {
        let (events, ready) = readiness_signal();
        ConnectivityManager {
            strategy,
            state: ConnectivityState::NotStarted,
            failed: None,
            controller: Box::new(controller),
            events: Some(events),
            ready: Some(ready),
        }
    }

    /// Get the configured strategy
    pub fn strategy(&self) -> LinkStrategy {
        self.strategy
    }

    /// Get the current connectivity state
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Handler to register with the carrier service
    ///
    /// Must be fetched before `bring_up` when the strategy is
    /// `ExternallyManaged`; once bring-up starts the manager releases its own
    /// copy, so a carrier source that never registered is reported as
    /// `ReadinessLost` instead of hanging.
    pub fn carrier_events(&self) -> Option<CarrierEventHandler> {
        self.events.clone()
    }

    /// Bring the link up
    ///
    /// Returns only with the state `Connected`. Under the carrier strategy
    /// this waits for `Ready` without any timeout.
    pub async fn bring_up(&mut self) -> FieldnodeResult<ConnectivityState> {
        if self.state.is_connected() {
            return Ok(self.state);
        }
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        match self.strategy {
            LinkStrategy::Automatic => {
                tracing::info!("LTE link managed by the system, nothing to configure");
            }
            LinkStrategy::ExternallyManaged => {
                self.advance(ConnectivityState::WaitingForExternalSignal);
                self.events = None;

                // Taken by an earlier wait that was cancelled
                let Some(ready) = self.ready.take() else {
                    return Err(self.fail(FieldnodeError::ReadinessLost));
                };

                tracing::info!("Waiting for carrier registration...");
                if ready.wait().await.is_err() {
                    return Err(self.fail(FieldnodeError::ReadinessLost));
                }
                tracing::info!("Registered!");
            }
            LinkStrategy::SelfManaged => {
                self.advance(ConnectivityState::Connecting);

                tracing::info!("LTE Link Connecting ...");
                if let Err(code) = self.controller.init_and_connect() {
                    tracing::error!(code = %code, "LTE link could not be established");
                    return Err(self.fail(FieldnodeError::LinkConnect(code)));
                }
                tracing::info!("LTE Link Connected!");
            }
        }

        self.advance(ConnectivityState::Connected);
        Ok(self.state)
    }

    /// Fatal error recorded by an earlier `bring_up`
    pub fn failure(&self) -> Option<&FieldnodeError> {
        self.failed.as_ref()
    }

    fn fail(&mut self, err: FieldnodeError) -> FieldnodeError {
        self.failed = Some(err.clone());
        err
    }

    fn advance(&mut self, next: ConnectivityState) {
        if next == self.state {
            return;
        }
        debug_assert!(
            self.state.can_advance_to(next),
            "connectivity state cannot move from {:?} to {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "connectivity state");
        self.state = next;
    }
}

impl std::fmt::Debug for ConnectivityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityManager")
            .field("strategy", &self.strategy)
            .field("state", &self.state)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use fieldnode_core::{CarrierEvent, ErrorCode};

    fn counting_controller(
        result: Result<(), ErrorCode>,
    ) -> (impl LinkController + Send + 'static, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let controller = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            result
        };
        (controller, calls)
    }

    #[tokio::test]
    async fn test_automatic_is_noop() {
        let (controller, calls) = counting_controller(Err(ErrorCode(-1)));
        let mut manager = ConnectivityManager::new(LinkStrategy::Automatic, controller);

        let state = manager.bring_up().await.unwrap();
        assert_eq!(state, ConnectivityState::Connected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_self_managed_connects() {
        let (controller, calls) = counting_controller(Ok(()));
        let mut manager = ConnectivityManager::new(LinkStrategy::SelfManaged, controller);

        assert_eq!(manager.bring_up().await.unwrap(), ConnectivityState::Connected);
        assert_eq!(manager.state(), ConnectivityState::Connected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_self_managed_failure_is_fatal() {
        let (controller, calls) = counting_controller(Err(ErrorCode(-116)));
        let mut manager = ConnectivityManager::new(LinkStrategy::SelfManaged, controller);

        let err = manager.bring_up().await.unwrap_err();
        assert!(matches!(err, FieldnodeError::LinkConnect(ErrorCode(-116))));
        assert!(err.is_fatal());
        assert_ne!(manager.state(), ConnectivityState::Connected);
        // No retry
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_carrier_waits_for_ready() {
        let (controller, calls) = counting_controller(Ok(()));
        let mut manager = ConnectivityManager::new(LinkStrategy::ExternallyManaged, controller);
        let events = manager.carrier_events().unwrap();

        let producer = tokio::spawn(async move {
            tokio::task::yield_now().await;
            events.handle(CarrierEvent::InitDone);
            events.handle(CarrierEvent::Connect);
            events.handle(CarrierEvent::Ready);
        });

        assert_eq!(manager.bring_up().await.unwrap(), ConnectivityState::Connected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        producer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_carrier_blocks_without_ready() {
        let (controller, _) = counting_controller(Ok(()));
        let mut manager = ConnectivityManager::new(LinkStrategy::ExternallyManaged, controller);
        let events = manager.carrier_events().unwrap();
        events.handle(CarrierEvent::Connect);

        let result = tokio::time::timeout(Duration::from_secs(3600), manager.bring_up()).await;
        assert!(result.is_err(), "bring_up must not return without Ready");
        assert_eq!(manager.state(), ConnectivityState::WaitingForExternalSignal);
        drop(events);
    }

    #[tokio::test]
    async fn test_carrier_without_event_source() {
        let (controller, _) = counting_controller(Ok(()));
        let mut manager = ConnectivityManager::new(LinkStrategy::ExternallyManaged, controller);

        let err = manager.bring_up().await.unwrap_err();
        assert!(matches!(err, FieldnodeError::ReadinessLost));
    }

    #[tokio::test]
    async fn test_self_managed_failure_is_terminal() {
        let (controller, calls) = counting_controller(Err(ErrorCode(-116)));
        let mut manager = ConnectivityManager::new(LinkStrategy::SelfManaged, controller);

        let first = manager.bring_up().await.unwrap_err();
        let second = manager.bring_up().await.unwrap_err();

        assert_eq!(first, second);
        assert_eq!(manager.failure(), Some(&FieldnodeError::LinkConnect(ErrorCode(-116))));
        assert_eq!(manager.state(), ConnectivityState::Connecting);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_readiness_lost_is_terminal() {
        let (controller, calls) = counting_controller(Ok(()));
        let mut manager = ConnectivityManager::new(LinkStrategy::ExternallyManaged, controller);

        assert_eq!(manager.bring_up().await, Err(FieldnodeError::ReadinessLost));
        assert_eq!(manager.bring_up().await, Err(FieldnodeError::ReadinessLost));
        assert_eq!(manager.state(), ConnectivityState::WaitingForExternalSignal);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_carrier_wait_reports_lost() {
        let (controller, _) = counting_controller(Ok(()));
        let mut manager = ConnectivityManager::new(LinkStrategy::ExternallyManaged, controller);
        let events = manager.carrier_events().unwrap();

        let waited = tokio::time::timeout(Duration::from_secs(60), manager.bring_up()).await;
        assert!(waited.is_err());

        // The signal receiver went with the cancelled wait
        assert_eq!(manager.bring_up().await, Err(FieldnodeError::ReadinessLost));
        events.handle(CarrierEvent::Ready);
        assert_eq!(manager.bring_up().await, Err(FieldnodeError::ReadinessLost));
        assert_eq!(manager.state(), ConnectivityState::WaitingForExternalSignal);
    }

    #[tokio::test]
    async fn test_bring_up_is_idempotent_once_connected() {
        let (controller, calls) = counting_controller(Ok(()));
        let mut manager = ConnectivityManager::new(LinkStrategy::SelfManaged, controller);

        manager.bring_up().await.unwrap();
        manager.bring_up().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("auto".parse::<LinkStrategy>().unwrap(), LinkStrategy::Automatic);
        assert_eq!(
            "Carrier".parse::<LinkStrategy>().unwrap(),
            LinkStrategy::ExternallyManaged
        );
        assert_eq!("lte".parse::<LinkStrategy>().unwrap(), LinkStrategy::SelfManaged);
        assert!("wifi".parse::<LinkStrategy>().is_err());
    }

    #[test]
    fn test_default_strategy_follows_build() {
        let expected = if cfg!(feature = "auto-connect") {
            LinkStrategy::Automatic
        } else if cfg!(feature = "carrier") {
            LinkStrategy::ExternallyManaged
        } else {
            LinkStrategy::SelfManaged
        };
        assert_eq!(LinkStrategy::default(), expected);
    }
}
