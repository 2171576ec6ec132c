//! Connectivity state and carrier events

/// Connectivity bring-up state
/// INVARIANT: transitions only move forward (declaration order), never back
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConnectivityState {
    #[default]
    NotStarted,
    WaitingForExternalSignal,
    Connecting,
    Connected,
}

impl ConnectivityState {
    /// Is moving from `self` to `next` a legal forward transition?
    pub fn can_advance_to(self, next: ConnectivityState) -> bool {
        next > self
    }

    pub fn is_connected(self) -> bool {
        self == ConnectivityState::Connected
    }
}

/// Events emitted by the carrier-management service
///
/// The set is closed: consumers match every variant explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CarrierEvent {
    /// Modem library initialised by the carrier service
    InitDone,
    /// Carrier service started connecting
    Connect,
    /// Carrier service dropped the link
    Disconnect,
    /// Registration complete, link usable
    Ready,
    /// Firmware-over-the-air update started
    FotaStart,
    /// Carrier service requests a reboot
    Reboot,
}

impl CarrierEvent {
    pub const ALL: [CarrierEvent; 6] = [
        CarrierEvent::InitDone,
        CarrierEvent::Connect,
        CarrierEvent::Disconnect,
        CarrierEvent::Ready,
        CarrierEvent::FotaStart,
        CarrierEvent::Reboot,
    ];

    /// Stable name used in log output
    pub fn name(self) -> &'static str {
        match self {
            CarrierEvent::InitDone => "CARRIER_EVENT_INIT_DONE",
            CarrierEvent::Connect => "CARRIER_EVENT_CONNECT",
            CarrierEvent::Disconnect => "CARRIER_EVENT_DISCONNECT",
            CarrierEvent::Ready => "CARRIER_EVENT_READY",
            CarrierEvent::FotaStart => "CARRIER_EVENT_FOTA_START",
            CarrierEvent::Reboot => "CARRIER_EVENT_REBOOT",
        }
    }
}

impl std::fmt::Display for CarrierEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
