use crate::error::{KeysnipError, Result};
use arboard::{Clipboard, ImageData};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;

/// What the clipboard held before we borrowed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardSnapshot {
    Empty,
    Text(String),
    Image {
        width: usize,
        height: usize,
        bytes: Vec<u8>,
    },
}

/// The system clipboard, a single process-global resource.
pub trait ClipboardAccess: Send + Sync {
    /// Current text, or `None` if the clipboard holds no text.
    fn get_text(&self) -> Result<Option<String>>;

    fn set_text(&self, text: &str) -> Result<()>;

    /// Capture the current contents so they can be put back later.
    fn snapshot(&self) -> Result<ClipboardSnapshot>;

    fn restore(&self, snapshot: ClipboardSnapshot) -> Result<()>;
}

fn clipboard_error(err: arboard::Error) -> KeysnipError {
    KeysnipError::Clipboard(err.to_string())
}

/// [`ClipboardAccess`] backed by arboard.
///
/// One arboard instance is opened on first use and kept for the life of the
/// value. On X11 the selection is only served while an instance is alive, so
/// text set for a paste must not be dropped before the target reads it.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Mutex<Option<Clipboard>>,
}

impl fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClipboard")
            .field("open", &self.is_open())
            .finish()
    }
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the underlying clipboard instance has been opened.
    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Clipboard) -> Result<R>) -> Result<R> {
        let mut inner = self.inner.lock();
        let clipboard = match inner.as_mut() {
            Some(clipboard) => clipboard,
            None => inner.insert(Clipboard::new().map_err(clipboard_error)?),
        };
        f(clipboard)
    }
}

impl ClipboardAccess for SystemClipboard {
    fn get_text(&self) -> Result<Option<String>> {
        self.with(|clipboard| match clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(clipboard_error(err)),
        })
    }

    fn set_text(&self, text: &str) -> Result<()> {
        self.with(|clipboard| clipboard.set_text(text).map_err(clipboard_error))
    }

    fn snapshot(&self) -> Result<ClipboardSnapshot> {
        self.with(|clipboard| {
            match clipboard.get_text() {
                Ok(text) => return Ok(ClipboardSnapshot::Text(text)),
                Err(arboard::Error::ContentNotAvailable) => {}
                Err(err) => return Err(clipboard_error(err)),
            }
            match clipboard.get_image() {
                Ok(image) => Ok(ClipboardSnapshot::Image {
                    width: image.width,
                    height: image.height,
                    bytes: image.bytes.into_owned(),
                }),
                Err(arboard::Error::ContentNotAvailable) => Ok(ClipboardSnapshot::Empty),
                Err(err) => Err(clipboard_error(err)),
            }
        })
    }

    fn restore(&self, snapshot: ClipboardSnapshot) -> Result<()> {
        self.with(|clipboard| match snapshot {
            ClipboardSnapshot::Empty => clipboard.clear().map_err(clipboard_error),
            ClipboardSnapshot::Text(text) => clipboard.set_text(text).map_err(clipboard_error),
            ClipboardSnapshot::Image {
                width,
                height,
                bytes,
            } => clipboard
                .set_image(ImageData {
                    width,
                    height,
                    bytes: Cow::Owned(bytes),
                })
                .map_err(clipboard_error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_lazily() {
        assert!(!SystemClipboard::new().is_open());
    }

    #[test]
    fn test_instance_outlives_set_text() {
        let clipboard = SystemClipboard::new();
        let saved = match clipboard.snapshot() {
            Ok(saved) => saved,
            // Headless: no clipboard to talk to.
            Err(_) => return,
        };

        clipboard.set_text("keysnip clipboard check").unwrap();
        assert!(clipboard.is_open());
        assert_eq!(
            clipboard.get_text().unwrap().as_deref(),
            Some("keysnip clipboard check")
        );
        clipboard.restore(saved).unwrap();
    }
}
