//! Decides which delivery path is trusted.
//!
//! The arbiter is a plain state machine: inputs come from the subscription,
//! the guard timer and the event stream, and each input returns the action the
//! driver has to carry out. It never touches timers or tasks itself.

use std::fmt;

/// Health of the push channel as seen by the consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncChannelState {
    #[default]
    Connecting,
    Live,
    Degraded,
}

impl fmt::Display for SyncChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Live => "live",
            Self::Degraded => "degraded",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArbiterState {
    /// Handshake pending, guard timer armed
    #[default]
    AwaitingPush,
    /// Push proven; polling never runs (or has been stopped)
    PushConfirmed,
    /// Push unavailable; polling is the trusted source
    PollingActive,
    /// Push reported live again but has not delivered yet; both paths run
    PollingWithPush,
    Stopped,
}

/// What the driver must do after an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterAction {
    None,
    StartPolling,
    StopPolling,
    Shutdown,
}

#[derive(Debug, Clone, Default)]
pub struct FallbackArbiter {
    state: ArbiterState,
    channel: SyncChannelState,
}

impl FallbackArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> ArbiterState {
        self.state
    }

    pub const fn channel_state(&self) -> SyncChannelState {
        self.channel
    }

    /// The guard timer only matters until the first verdict.
    pub const fn guard_armed(&self) -> bool {
        matches!(self.state, ArbiterState::AwaitingPush)
    }

    pub const fn is_polling(&self) -> bool {
        matches!(
            self.state,
            ArbiterState::PollingActive | ArbiterState::PollingWithPush
        )
    }

    /// Subscription confirmed its handshake.
    pub fn on_live(&mut self) -> ArbiterAction {
        if self.state == ArbiterState::Stopped {
            return ArbiterAction::None;
        }
        self.channel = SyncChannelState::Live;
        match self.state {
            ArbiterState::AwaitingPush => self.transition(ArbiterState::PushConfirmed),
            ArbiterState::PollingActive => self.transition(ArbiterState::PollingWithPush),
            _ => {}
        }
        ArbiterAction::None
    }

    /// Subscription reported an error, a timeout or a close.
    pub fn on_degraded(&mut self) -> ArbiterAction {
        if self.state == ArbiterState::Stopped {
            return ArbiterAction::None;
        }
        self.channel = SyncChannelState::Degraded;
        match self.state {
            ArbiterState::AwaitingPush | ArbiterState::PushConfirmed => {
                self.transition(ArbiterState::PollingActive);
                ArbiterAction::StartPolling
            }
            ArbiterState::PollingWithPush => {
                self.transition(ArbiterState::PollingActive);
                ArbiterAction::None
            }
            ArbiterState::PollingActive | ArbiterState::Stopped => ArbiterAction::None,
        }
    }

    /// Guard window elapsed without a verdict.
    pub fn on_guard_elapsed(&mut self) -> ArbiterAction {
        if self.state != ArbiterState::AwaitingPush {
            return ArbiterAction::None;
        }
        self.channel = SyncChannelState::Degraded;
        self.transition(ArbiterState::PollingActive);
        ArbiterAction::StartPolling
    }

    /// A push-delivered event reached the consumer.
    ///
    /// Delivery proves the channel works, so polling is stopped for good; no
    /// new guard is armed afterwards.
    pub fn on_push_event(&mut self) -> ArbiterAction {
        match self.state {
            ArbiterState::PollingActive | ArbiterState::PollingWithPush => {
                self.channel = SyncChannelState::Live;
                self.transition(ArbiterState::PushConfirmed);
                ArbiterAction::StopPolling
            }
            ArbiterState::AwaitingPush => {
                self.channel = SyncChannelState::Live;
                self.transition(ArbiterState::PushConfirmed);
                ArbiterAction::None
            }
            ArbiterState::PushConfirmed | ArbiterState::Stopped => ArbiterAction::None,
        }
    }

    pub fn stop(&mut self) -> ArbiterAction {
        if self.state == ArbiterState::Stopped {
            return ArbiterAction::None;
        }
        self.transition(ArbiterState::Stopped);
        ArbiterAction::Shutdown
    }

    fn transition(&mut self, next: ArbiterState) {
        tracing::debug!("Fallback arbiter: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
