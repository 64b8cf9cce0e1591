use crate::buffer_actor::{BufferCommand, ClearReason};
use crate::event_source::{DisableReason, KeystrokeHandler};
use crate::health::HealthCommand;
use crossbeam_channel::Sender;
use keysnip_core::{KeyInput, Modifier};
use std::sync::atomic::{AtomicBool, Ordering};

/// Turns raw keystrokes into buffer commands.
///
/// This runs on the OS callback thread. It only tracks held modifiers and
/// forwards to unbounded channels, so it never blocks.
pub struct KeystrokeRouter {
    buffer: Sender<BufferCommand>,
    health: Sender<HealthCommand>,
    control_held: AtomicBool,
    meta_held: AtomicBool,
}

impl KeystrokeRouter {
    pub(crate) fn new(buffer: Sender<BufferCommand>, health: Sender<HealthCommand>) -> Self {
        Self {
            buffer,
            health,
            control_held: AtomicBool::new(false),
            meta_held: AtomicBool::new(false),
        }
    }

    /// Whether a shortcut modifier is down, making the next key a command
    /// rather than text.
    fn shortcut_held(&self) -> bool {
        self.control_held.load(Ordering::Relaxed) || self.meta_held.load(Ordering::Relaxed)
    }

    fn set_modifier(&self, modifier: Modifier, held: bool) {
        match modifier {
            Modifier::Control => self.control_held.store(held, Ordering::Relaxed),
            Modifier::Meta => self.meta_held.store(held, Ordering::Relaxed),
            // Shift, Alt and AltGr produce text on most layouts.
            Modifier::Shift | Modifier::Alt | Modifier::AltGr => {}
        }
    }

    fn forward(&self, command: BufferCommand) {
        if self.buffer.send(command).is_err() {
            tracing::trace!("Buffer actor gone; dropping keystroke");
        }
    }
}

impl KeystrokeHandler for KeystrokeRouter {
    fn on_key_down(&self, key: KeyInput) {
        match key {
            KeyInput::Char(_) | KeyInput::Backspace if self.shortcut_held() => {
                self.forward(BufferCommand::Clear(ClearReason::Shortcut))
            }
            KeyInput::Char(c) => self.forward(BufferCommand::Append(c)),
            KeyInput::Backspace => self.forward(BufferCommand::RemoveLast),
            KeyInput::Navigation => self.forward(BufferCommand::Clear(ClearReason::Navigation)),
            KeyInput::Modifier(modifier) => self.set_modifier(modifier, true),
            KeyInput::Ignored => {}
        }
    }

    fn on_key_up(&self, key: KeyInput) {
        if let KeyInput::Modifier(modifier) = key {
            self.set_modifier(modifier, false);
        }
    }

    fn on_disabled(&self, reason: DisableReason) {
        if self.health.send(HealthCommand::Disabled(reason)).is_err() {
            tracing::trace!("Health supervisor gone; dropping disable notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver};

    fn router() -> (KeystrokeRouter, Receiver<BufferCommand>, Receiver<HealthCommand>) {
        let (buffer_tx, buffer_rx) = unbounded();
        let (health_tx, health_rx) = unbounded();
        (KeystrokeRouter::new(buffer_tx, health_tx), buffer_rx, health_rx)
    }

    #[test]
    fn test_plain_keys_are_forwarded() {
        let (router, rx, _) = router();
        router.on_key_down(KeyInput::Char('h'));
        router.on_key_down(KeyInput::Backspace);
        router.on_key_down(KeyInput::Navigation);
        router.on_key_down(KeyInput::Ignored);

        assert!(matches!(rx.try_recv(), Ok(BufferCommand::Append('h'))));
        assert!(matches!(rx.try_recv(), Ok(BufferCommand::RemoveLast)));
        assert!(matches!(
            rx.try_recv(),
            Ok(BufferCommand::Clear(ClearReason::Navigation))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_shortcut_chord_clears_instead_of_appending() {
        let (router, rx, _) = router();
        router.on_key_down(KeyInput::Modifier(Modifier::Control));
        router.on_key_down(KeyInput::Char('v'));
        router.on_key_up(KeyInput::Modifier(Modifier::Control));
        router.on_key_down(KeyInput::Char('x'));

        assert!(matches!(
            rx.try_recv(),
            Ok(BufferCommand::Clear(ClearReason::Shortcut))
        ));
        assert!(matches!(rx.try_recv(), Ok(BufferCommand::Append('x'))));
    }

    #[test]
    fn test_shift_does_not_turn_keys_into_shortcuts() {
        let (router, rx, _) = router();
        router.on_key_down(KeyInput::Modifier(Modifier::Shift));
        router.on_key_down(KeyInput::Char('H'));
        assert!(matches!(rx.try_recv(), Ok(BufferCommand::Append('H'))));
    }

    #[test]
    fn test_disable_is_reported_to_health() {
        let (router, _, health) = router();
        router.on_disabled(DisableReason::Timeout);
        assert!(matches!(
            health.try_recv(),
            Ok(HealthCommand::Disabled(DisableReason::Timeout))
        ));
    }

    #[test]
    fn test_closed_channels_do_not_panic() {
        let (router, rx, health) = router();
        drop(rx);
        drop(health);
        router.on_key_down(KeyInput::Char('a'));
        router.on_disabled(DisableReason::Revoked);
    }
}
