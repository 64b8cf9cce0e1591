//! Core of the keysnip text-expansion engine.
//!
//! Everything here is independent of how keystrokes are observed: the
//! command index, the rolling input buffer, keyword and metafield
//! resolution, target classification, and the seams for synthesizing
//! keystrokes and borrowing the clipboard.

pub mod buffer;
pub mod clipboard;
pub mod config;
pub mod context;
pub mod error;
pub mod focus;
pub mod keyboard;
pub mod matcher;
pub mod models;
pub mod prefilter;
pub mod resolver;

// Re-export common items for convenience
pub use buffer::InputBuffer;
pub use clipboard::{ClipboardAccess, ClipboardSnapshot, SystemClipboard};
pub use config::{get_config_dir, load_config, EngineConfig, MetafieldPromptKind};
pub use context::{AppContext, AppContextClassifier, Classification, TimingProfile};
pub use error::{KeysnipError, Result};
pub use focus::{AppIdentity, FocusMetadataSource, NullFocusSource, PlatformFocusSource};
pub use keyboard::{EnigoSynth, KeyInput, KeySynth, Modifier, PasteChord};
pub use matcher::{CommandIndex, CommandMatcher, SuffixMatch};
pub use models::{Metafield, Snippet};
pub use resolver::{extract_metafields, resolve, KeywordContext, ResolvedContent};
