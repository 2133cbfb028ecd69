//! Time-boxed capture permission.
//!
//! While ads are required, capture is only allowed until the stored unlock
//! expiry. [`UnlockGate::wait_for_expiry`] watches that instant for a
//! running session and returns once the window has closed, after clearing
//! the stored expiry.

use crate::config::{FeatureFlags, SettingsStore, UNLOCK_GRANT_DURATION};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Wall-clock source in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// [`Clock`] reading the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// What the gate decided on one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Unlocking is not required; check again later
    Inert,
    /// Window still open (or never granted); sleep this long
    Wait(Duration),
    /// Window has closed
    Expired,
}

/// Watches the unlock window for one service.
#[derive(Clone)]
pub struct UnlockGate {
    settings: Arc<dyn SettingsStore>,
    flags: Arc<dyn FeatureFlags>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl UnlockGate {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        flags: Arc<dyn FeatureFlags>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            settings,
            flags,
            clock,
            poll_interval,
        }
    }

    pub fn is_ad_required(&self) -> bool {
        self.flags.is_ad_required()
    }

    /// Decide what to do right now. Does not modify state.
    pub fn evaluate(&self) -> GateDecision {
        if !self.flags.is_ad_required() {
            return GateDecision::Inert;
        }

        let expiry = self.settings.unlock_expiry_ms();
        if expiry <= 0 {
            return GateDecision::Wait(self.poll_interval);
        }

        let now = self.clock.now_ms();
        if now >= expiry {
            return GateDecision::Expired;
        }

        let remaining = Duration::from_millis((expiry - now) as u64);
        GateDecision::Wait(remaining.min(self.poll_interval))
    }

    /// Sleep until the unlock window closes, then clear the stored expiry.
    ///
    /// Never returns while unlocking is not required.
    pub async fn wait_for_expiry(&self) {
        loop {
            match self.evaluate() {
                GateDecision::Inert => tokio::time::sleep(self.poll_interval).await,
                GateDecision::Wait(delay) => tokio::time::sleep(delay).await,
                GateDecision::Expired => {
                    self.settings.set_unlock_expiry_ms(0);
                    info!("Capture unlock window expired");
                    return;
                }
            }
        }
    }

    /// Whether a session may start or capture right now.
    pub fn capture_allowed(&self) -> bool {
        if !self.flags.is_ad_required() {
            return true;
        }
        self.settings.unlock_expiry_ms() > self.clock.now_ms()
    }

    /// Remaining unlock time, zero when locked.
    pub fn remaining(&self) -> Duration {
        let expiry = self.settings.unlock_expiry_ms();
        let now = self.clock.now_ms();
        if expiry > now {
            Duration::from_millis((expiry - now) as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Open the unlock window for [`UNLOCK_GRANT_DURATION`] from now.
    ///
    /// Returns the new expiry in epoch milliseconds.
    pub fn grant(&self) -> i64 {
        let expiry = self.clock.now_ms() + UNLOCK_GRANT_DURATION.as_millis() as i64;
        self.settings.set_unlock_expiry_ms(expiry);
        debug!("Capture unlocked until {}", expiry);
        expiry
    }
}
