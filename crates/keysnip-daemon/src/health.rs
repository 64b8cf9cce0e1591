//! Keeps keystroke observation alive.
//!
//! [`HealthMonitor`] is the escalation policy and knows nothing about
//! threads; [`HealthSupervisor`] applies it to a live event source, reacting
//! to disable notifications and checking status on a fixed interval.

use crate::event_source::{DisableReason, KeystrokeEventSource};
use crossbeam_channel::{select, tick, Receiver};
use keysnip_core::Result;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Externally visible state of keystroke observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservationStatus {
    #[default]
    Inactive,
    Active,
    Recovering,
    /// Automatic recovery gave up; the user has to intervene.
    Fallback,
}

impl fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObservationStatus::Inactive => "inactive",
            ObservationStatus::Active => "active",
            ObservationStatus::Recovering => "recovering",
            ObservationStatus::Fallback => "fallback",
        };
        f.write_str(label)
    }
}

/// What to do about a disabled event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    ReEnable,
    Recreate,
    Fallback,
}

/// Failure-counting escalation policy.
///
/// Within one failure window the first failure re-enables in place, the
/// second recreates the source, and the third gives up and resets the count.
/// A quiet period without failures also resets the count.
#[derive(Debug)]
pub struct HealthMonitor {
    failure_window: Duration,
    quiet_period: Duration,
    failures: VecDeque<Instant>,
}

impl HealthMonitor {
    pub fn new(failure_window: Duration, quiet_period: Duration) -> Self {
        Self {
            failure_window,
            quiet_period,
            failures: VecDeque::new(),
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Record a failure and decide how to recover from it.
    pub fn on_disabled_event(&mut self, reason: &DisableReason, now: Instant) -> RecoveryAction {
        self.prune(now);
        self.failures.push_back(now);

        let action = match self.failures.len() {
            1 => RecoveryAction::ReEnable,
            2 => RecoveryAction::Recreate,
            _ => {
                self.failures.clear();
                RecoveryAction::Fallback
            }
        };
        tracing::warn!(%reason, ?action, "Keystroke observation disabled");
        action
    }

    /// Periodic check. A disabled source counts as a failure; an enabled one
    /// lets the count decay.
    pub fn check_status(&mut self, enabled: bool, now: Instant) -> Option<RecoveryAction> {
        if !enabled {
            return Some(self.on_disabled_event(&DisableReason::PeriodicCheck, now));
        }
        if let Some(last) = self.failures.back() {
            if now.duration_since(*last) >= self.quiet_period {
                tracing::debug!("Observation quiet; resetting failure count");
                self.failures.clear();
            }
        }
        None
    }

    pub fn reset(&mut self) {
        self.failures.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(first) = self.failures.front() {
            if now.duration_since(*first) > self.failure_window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

pub enum HealthCommand {
    Disabled(DisableReason),
    /// User-requested recovery out of the fallback state.
    Retry,
    Shutdown,
}

pub type SharedEventSource = Arc<Mutex<Box<dyn KeystrokeEventSource>>>;

pub(crate) struct HealthSupervisor {
    source: SharedEventSource,
    monitor: HealthMonitor,
    status: Arc<RwLock<ObservationStatus>>,
    interval: Duration,
}

impl HealthSupervisor {
    pub(crate) fn new(
        source: SharedEventSource,
        monitor: HealthMonitor,
        status: Arc<RwLock<ObservationStatus>>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            monitor,
            status,
            interval,
        }
    }

    pub(crate) fn spawn(self, commands: Receiver<HealthCommand>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("keysnip-health".to_string())
            .spawn(move || self.run(commands))?;
        Ok(handle)
    }

    fn run(mut self, commands: Receiver<HealthCommand>) {
        let ticker = tick(self.interval);
        loop {
            select! {
                recv(commands) -> command => match command {
                    Ok(HealthCommand::Disabled(reason)) => {
                        let action = self.monitor.on_disabled_event(&reason, Instant::now());
                        self.apply(action);
                    }
                    Ok(HealthCommand::Retry) => {
                        tracing::info!("Retrying keystroke observation");
                        self.monitor.reset();
                        self.apply(RecoveryAction::Recreate);
                    }
                    Ok(HealthCommand::Shutdown) | Err(_) => break,
                },
                recv(ticker) -> _ => self.periodic_check(),
            }
        }
        tracing::debug!("Health supervisor stopped");
    }

    fn periodic_check(&mut self) {
        let enabled = self.source.lock().is_enabled();
        let status = *self.status.read();

        if status == ObservationStatus::Fallback {
            // Stay down until the user retries or the source comes back on its own.
            if enabled {
                self.monitor.reset();
                self.set_status(ObservationStatus::Active);
            }
            return;
        }

        match self.monitor.check_status(enabled, Instant::now()) {
            Some(action) => self.apply(action),
            None if status == ObservationStatus::Recovering => {
                self.set_status(ObservationStatus::Active)
            }
            None => {}
        }
    }

    fn apply(&mut self, action: RecoveryAction) {
        let result = {
            let mut source = self.source.lock();
            let attempt = match action {
                RecoveryAction::ReEnable => source.enable(),
                RecoveryAction::Recreate => source.recreate(),
                RecoveryAction::Fallback => {
                    tracing::error!(
                        "Keystroke observation keeps failing; automatic recovery stopped"
                    );
                    self.set_status(ObservationStatus::Fallback);
                    return;
                }
            };
            attempt.map(|_| source.is_enabled())
        };

        match result {
            Ok(true) => {
                tracing::info!(?action, "Keystroke observation restored");
                self.set_status(ObservationStatus::Active);
            }
            Ok(false) => self.set_status(ObservationStatus::Recovering),
            Err(err) => {
                tracing::warn!(?action, error = %err, "Recovery attempt failed");
                self.set_status(ObservationStatus::Recovering);
            }
        }
    }

    fn set_status(&self, status: ObservationStatus) {
        let mut current = self.status.write();
        if *current != status {
            tracing::debug!(from = %*current, to = %status, "Observation status changed");
            *current = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(30);
    const QUIET: Duration = Duration::from_secs(60);

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(WINDOW, QUIET)
    }

    #[test]
    fn test_escalation_within_window() {
        let mut monitor = monitor();
        let start = Instant::now();
        let reason = DisableReason::Timeout;

        assert_eq!(monitor.on_disabled_event(&reason, start), RecoveryAction::ReEnable);
        assert_eq!(
            monitor.on_disabled_event(&reason, start + Duration::from_secs(1)),
            RecoveryAction::Recreate
        );
        assert_eq!(
            monitor.on_disabled_event(&reason, start + Duration::from_secs(2)),
            RecoveryAction::Fallback
        );
        assert_eq!(monitor.failure_count(), 0);

        // The count starts over after giving up.
        assert_eq!(
            monitor.on_disabled_event(&reason, start + Duration::from_secs(3)),
            RecoveryAction::ReEnable
        );
    }

    #[test]
    fn test_failures_outside_window_do_not_escalate() {
        let mut monitor = monitor();
        let start = Instant::now();
        let reason = DisableReason::Timeout;

        monitor.on_disabled_event(&reason, start);
        assert_eq!(
            monitor.on_disabled_event(&reason, start + WINDOW + Duration::from_secs(1)),
            RecoveryAction::ReEnable
        );
    }

    #[test]
    fn test_quiet_period_resets_count() {
        let mut monitor = monitor();
        let start = Instant::now();
        monitor.on_disabled_event(&DisableReason::Timeout, start);

        assert_eq!(monitor.check_status(true, start + Duration::from_secs(10)), None);
        assert_eq!(monitor.failure_count(), 1);

        assert_eq!(monitor.check_status(true, start + QUIET), None);
        assert_eq!(monitor.failure_count(), 0);
    }

    #[test]
    fn test_periodic_check_counts_disabled_source() {
        let mut monitor = monitor();
        let start = Instant::now();
        assert_eq!(
            monitor.check_status(false, start),
            Some(RecoveryAction::ReEnable)
        );
        assert_eq!(
            monitor.check_status(false, start + Duration::from_secs(5)),
            Some(RecoveryAction::Recreate)
        );
    }
}
