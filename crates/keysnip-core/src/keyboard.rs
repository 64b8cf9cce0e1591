use crate::error::{KeysnipError, Result};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use rdev::{self, Key as RdevKey};
use std::thread;
use std::time::Duration;

/// Modifier keys that change what a keystroke means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Shift,
    Control,
    Meta,
    Alt,
    /// Used to type characters on many international layouts.
    AltGr,
}

/// A keystroke reduced to what the input buffer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
    /// Anything that moves the caret away from where the buffer thinks it is.
    Navigation,
    Modifier(Modifier),
    Ignored,
}

/// Convert an rdev key event into a [`KeyInput`].
pub fn translate_rdev_key(key: &RdevKey, event: &rdev::Event) -> KeyInput {
    match key {
        RdevKey::Backspace => KeyInput::Backspace,
        RdevKey::Return | RdevKey::KpReturn => KeyInput::Char('\n'),
        RdevKey::Tab => KeyInput::Char('\t'),
        RdevKey::Space => KeyInput::Char(' '),
        RdevKey::LeftArrow
        | RdevKey::RightArrow
        | RdevKey::UpArrow
        | RdevKey::DownArrow
        | RdevKey::Home
        | RdevKey::End
        | RdevKey::PageUp
        | RdevKey::PageDown
        | RdevKey::Escape
        | RdevKey::Delete => KeyInput::Navigation,
        RdevKey::ShiftLeft | RdevKey::ShiftRight | RdevKey::CapsLock => {
            KeyInput::Modifier(Modifier::Shift)
        }
        RdevKey::ControlLeft | RdevKey::ControlRight => KeyInput::Modifier(Modifier::Control),
        RdevKey::MetaLeft | RdevKey::MetaRight => KeyInput::Modifier(Modifier::Meta),
        RdevKey::Alt => KeyInput::Modifier(Modifier::Alt),
        RdevKey::AltGr => KeyInput::Modifier(Modifier::AltGr),
        _ => event
            .name
            .as_deref()
            .and_then(single_printable_char)
            .map(KeyInput::Char)
            .unwrap_or(KeyInput::Ignored),
    }
}

fn single_printable_char(name: &str) -> Option<char> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => Some(c),
        _ => None,
    }
}

/// Which shortcut the focused target pastes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteChord {
    /// Cmd+V on macOS, Ctrl+V elsewhere.
    Standard,
    /// Terminal emulators outside macOS read Ctrl+V as a literal-next key
    /// and paste with Ctrl+Shift+V.
    Shifted,
}

/// Synthesizes the keystrokes needed to edit the focused target.
pub trait KeySynth {
    fn backspace(&mut self) -> Result<()>;

    /// Trigger the paste shortcut.
    fn paste(&mut self, chord: PasteChord) -> Result<()>;

    fn cursor_left(&mut self) -> Result<()>;
}

/// Create a keyboard controller
pub fn create_keyboard_controller() -> Result<Enigo> {
    Enigo::new(&Settings::default()).map_err(|err| {
        KeysnipError::Keyboard(format!("Failed to create keyboard controller: {}", err))
    })
}

/// [`KeySynth`] backed by enigo.
pub struct EnigoSynth {
    enigo: Enigo,
}

impl EnigoSynth {
    pub fn new() -> Result<Self> {
        Ok(Self {
            enigo: create_keyboard_controller()?,
        })
    }

    fn click(&mut self, key: Key, what: &str) -> Result<()> {
        self.enigo
            .key(key, Direction::Click)
            .map_err(|err| KeysnipError::Injection(format!("Failed to send {}: {}", what, err)))
    }
}

impl KeySynth for EnigoSynth {
    fn backspace(&mut self) -> Result<()> {
        self.click(Key::Backspace, "backspace")
    }

    fn paste(&mut self, chord: PasteChord) -> Result<()> {
        let modifiers: &[Key] = if cfg!(target_os = "macos") {
            &[Key::Meta]
        } else if chord == PasteChord::Shifted {
            &[Key::Control, Key::Shift]
        } else {
            &[Key::Control]
        };

        let mut pressed = Vec::with_capacity(modifiers.len());
        let mut result = Ok(());
        for &modifier in modifiers {
            match self.enigo.key(modifier, Direction::Press) {
                Ok(()) => pressed.push(modifier),
                Err(err) => {
                    result = Err(KeysnipError::Injection(format!(
                        "Failed to press modifier: {}",
                        err
                    )));
                    break;
                }
            }
        }

        if result.is_ok() {
            // Small delay to ensure modifiers are registered
            thread::sleep(Duration::from_millis(10));
            result = self.click(Key::Unicode('v'), "paste");
        }

        // Always release what was pressed, even if the paste key failed
        for modifier in pressed.into_iter().rev() {
            let released = self.enigo.key(modifier, Direction::Release).map_err(|err| {
                KeysnipError::Injection(format!("Failed to release modifier: {}", err))
            });
            result = result.and(released);
        }
        result
    }

    fn cursor_left(&mut self) -> Result<()> {
        self.click(Key::LeftArrow, "left arrow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn event(key: RdevKey, name: Option<&str>) -> rdev::Event {
        rdev::Event {
            time: SystemTime::now(),
            name: name.map(str::to_string),
            event_type: rdev::EventType::KeyPress(key),
        }
    }

    fn translate(key: RdevKey, name: Option<&str>) -> KeyInput {
        translate_rdev_key(&key, &event(key, name))
    }

    #[test]
    fn test_printable_keys_use_event_name() {
        assert_eq!(translate(RdevKey::KeyA, Some("a")), KeyInput::Char('a'));
        assert_eq!(translate(RdevKey::KeyA, Some("A")), KeyInput::Char('A'));
        assert_eq!(translate(RdevKey::SemiColon, Some(":")), KeyInput::Char(':'));
        assert_eq!(translate(RdevKey::KeyE, Some("é")), KeyInput::Char('é'));
    }

    #[test]
    fn test_whitespace_keys() {
        assert_eq!(translate(RdevKey::Space, Some(" ")), KeyInput::Char(' '));
        assert_eq!(translate(RdevKey::Return, Some("\r")), KeyInput::Char('\n'));
        assert_eq!(translate(RdevKey::Tab, None), KeyInput::Char('\t'));
    }

    #[test]
    fn test_editing_and_navigation_keys() {
        assert_eq!(translate(RdevKey::Backspace, None), KeyInput::Backspace);
        assert_eq!(translate(RdevKey::LeftArrow, None), KeyInput::Navigation);
        assert_eq!(translate(RdevKey::Escape, None), KeyInput::Navigation);
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(
            translate(RdevKey::ControlLeft, None),
            KeyInput::Modifier(Modifier::Control)
        );
        assert_eq!(translate(RdevKey::MetaRight, None), KeyInput::Modifier(Modifier::Meta));
        assert_eq!(translate(RdevKey::AltGr, None), KeyInput::Modifier(Modifier::AltGr));
    }

    #[test]
    fn test_unnamed_or_control_keys_are_ignored() {
        assert_eq!(translate(RdevKey::F5, None), KeyInput::Ignored);
        assert_eq!(translate(RdevKey::KeyA, Some("\u{1}")), KeyInput::Ignored);
        assert_eq!(translate(RdevKey::KeyA, Some("ab")), KeyInput::Ignored);
    }
}
