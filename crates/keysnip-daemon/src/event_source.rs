//! Keystroke observation boundary.
//!
//! The engine only talks to [`KeystrokeEventSource`]; everything that
//! depends on how the OS hands out keystrokes lives behind it.

use keysnip_core::keyboard::translate_rdev_key;
use keysnip_core::{KeyInput, KeysnipError, Result};
use rdev::{self, EventType};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Why keystroke observation stopped delivering events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableReason {
    /// The OS dropped the hook because a callback took too long.
    Timeout,
    /// The user or the system revoked observation.
    Revoked,
    /// The listener itself failed or exited.
    ListenerFailed(String),
    /// A periodic status check found observation disabled.
    PeriodicCheck,
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisableReason::Timeout => write!(f, "callback timeout"),
            DisableReason::Revoked => write!(f, "revoked"),
            DisableReason::ListenerFailed(err) => write!(f, "listener failed: {}", err),
            DisableReason::PeriodicCheck => write!(f, "found disabled by status check"),
        }
    }
}

/// Receiver of observed keystrokes.
///
/// Implementations run on the OS callback thread and must return promptly:
/// no blocking, no panics, no heavy work.
pub trait KeystrokeHandler: Send + Sync {
    fn on_key_down(&self, key: KeyInput);
    fn on_key_up(&self, key: KeyInput);
    fn on_disabled(&self, reason: DisableReason);
}

/// An OS facility that observes keystrokes system-wide.
pub trait KeystrokeEventSource: Send {
    /// Begin delivering events to `handler`.
    fn start(&mut self, handler: Arc<dyn KeystrokeHandler>) -> Result<()>;

    /// Stop delivering events.
    fn stop(&mut self);

    /// Whether events are currently being delivered.
    fn is_enabled(&self) -> bool;

    /// Re-enable the existing observation handle in place.
    fn enable(&mut self) -> Result<()>;

    /// Tear down the observation handle and create a fresh one.
    fn recreate(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
struct RdevShared {
    enabled: AtomicBool,
    alive: AtomicBool,
}

/// [`KeystrokeEventSource`] backed by `rdev::listen`.
///
/// `rdev::listen` never returns while the hook is healthy and cannot be
/// cancelled, so stopping only gates dispatch; the listener thread lives
/// until the process exits or the hook fails.
#[derive(Default)]
pub struct RdevEventSource {
    shared: Arc<RdevShared>,
    handler: Option<Arc<dyn KeystrokeHandler>>,
}

impl RdevEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn_listener(&mut self, handler: Arc<dyn KeystrokeHandler>) -> Result<()> {
        let shared = Arc::new(RdevShared::default());
        shared.enabled.store(true, Ordering::SeqCst);
        shared.alive.store(true, Ordering::SeqCst);
        self.shared = Arc::clone(&shared);

        let callback_shared = Arc::clone(&shared);
        let callback_handler = Arc::clone(&handler);

        thread::Builder::new()
            .name("keysnip-rdev".to_string())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if !callback_shared.enabled.load(Ordering::Relaxed) {
                        return;
                    }
                    match event.event_type {
                        EventType::KeyPress(key) => {
                            callback_handler.on_key_down(translate_rdev_key(&key, &event))
                        }
                        EventType::KeyRelease(key) => {
                            callback_handler.on_key_up(translate_rdev_key(&key, &event))
                        }
                        // A click almost always moves the caret somewhere else.
                        EventType::ButtonPress(_) => callback_handler.on_key_down(KeyInput::Navigation),
                        _ => {}
                    }
                });

                shared.alive.store(false, Ordering::SeqCst);
                let reason = match result {
                    Ok(()) => DisableReason::ListenerFailed("listener returned".to_string()),
                    Err(err) => DisableReason::ListenerFailed(format!("{:?}", err)),
                };
                tracing::warn!(%reason, "Keyboard listener exited");
                handler.on_disabled(reason);
            })?;

        Ok(())
    }
}

impl KeystrokeEventSource for RdevEventSource {
    fn start(&mut self, handler: Arc<dyn KeystrokeHandler>) -> Result<()> {
        if self.shared.alive.load(Ordering::SeqCst) {
            return Err(KeysnipError::EngineState(
                "keyboard listener already started".to_string(),
            ));
        }
        self.handler = Some(Arc::clone(&handler));
        self.spawn_listener(handler)
    }

    fn stop(&mut self) {
        self.shared.enabled.store(false, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst) && self.shared.alive.load(Ordering::SeqCst)
    }

    fn enable(&mut self) -> Result<()> {
        if !self.shared.alive.load(Ordering::SeqCst) {
            return Err(KeysnipError::ObservationDisabled(
                "keyboard listener has exited".to_string(),
            ));
        }
        self.shared.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn recreate(&mut self) -> Result<()> {
        if self.shared.alive.load(Ordering::SeqCst) {
            // The hook is still installed; a second one would double every event.
            self.shared.enabled.store(true, Ordering::SeqCst);
            return Ok(());
        }
        let handler = self.handler.clone().ok_or_else(|| {
            KeysnipError::EngineState("keyboard listener was never started".to_string())
        })?;
        tracing::info!("Recreating keyboard listener");
        self.spawn_listener(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unstarted_source_is_disabled() {
        let mut source = RdevEventSource::new();
        assert!(!source.is_enabled());
        assert!(source.enable().is_err());
        assert!(matches!(source.recreate(), Err(KeysnipError::EngineState(_))));
    }

    #[test]
    fn test_disable_reason_display() {
        assert_eq!(DisableReason::Timeout.to_string(), "callback timeout");
        assert_eq!(
            DisableReason::ListenerFailed("boom".to_string()).to_string(),
            "listener failed: boom"
        );
    }
}
