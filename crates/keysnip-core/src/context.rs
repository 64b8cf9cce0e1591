//! Classification of the focused application and its timing policy.
//!
//! Targets differ in how quickly they consume synthetic input. Browsers,
//! Electron shells, remote terminals and virtual machines all put extra
//! asynchronous hops between the keystroke and the text field, and events
//! delivered faster than they drain get dropped or reordered.

use crate::focus::{AppIdentity, FocusMetadataSource, ProcessInspector};
use crate::keyboard::PasteChord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Category of the application that currently has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppContext {
    Standard,
    Terminal,
    RemoteShell,
    /// Browsers and embedded web runtimes (Electron and friends).
    Browser,
    /// Virtual machines and remote desktop viewers.
    Virtualization,
    /// Password fields, password managers and other secure text entry.
    RestrictedInput,
    /// Full-screen application that is not a known productivity tool.
    Game,
    /// An input method is composing text that has not been committed yet.
    Composing,
}

/// Delays and deletion strategy used when editing a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProfile {
    pub deletion_inter_key_delay: Duration,
    pub injection_settle_delay: Duration,
    /// Send one discrete backspace per character, pausing after each.
    pub use_simple_deletion: bool,
    pub paste_chord: PasteChord,
}

impl TimingProfile {
    const fn new(deletion_ms: u64, settle_ms: u64, use_simple_deletion: bool) -> Self {
        Self {
            deletion_inter_key_delay: Duration::from_millis(deletion_ms),
            injection_settle_delay: Duration::from_millis(settle_ms),
            use_simple_deletion,
            paste_chord: PasteChord::Standard,
        }
    }

    fn shifted_paste(mut self) -> Self {
        self.paste_chord = PasteChord::Shifted;
        self
    }
}

impl AppContext {
    pub fn timing_profile(self) -> TimingProfile {
        match self {
            AppContext::Standard
            | AppContext::RestrictedInput
            | AppContext::Game
            | AppContext::Composing => TimingProfile::new(3, 60, false),
            AppContext::Terminal => TimingProfile::new(5, 80, true).shifted_paste(),
            AppContext::RemoteShell => TimingProfile::new(15, 150, true).shifted_paste(),
            AppContext::Browser => TimingProfile::new(10, 150, true),
            AppContext::Virtualization => TimingProfile::new(25, 250, true),
        }
    }

    /// Whether no replacement may be attempted in this context.
    pub fn should_suppress_expansion(self) -> bool {
        matches!(
            self,
            AppContext::RestrictedInput | AppContext::Game | AppContext::Composing
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            AppContext::Standard => "standard",
            AppContext::Terminal => "terminal",
            AppContext::RemoteShell => "remote-shell",
            AppContext::Browser => "browser",
            AppContext::Virtualization => "virtualization",
            AppContext::RestrictedInput => "restricted-input",
            AppContext::Game => "game",
            AppContext::Composing => "composing",
        }
    }
}

impl fmt::Display for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub const TERMINAL_APPS: &[&str] = &[
    "com.apple.terminal",
    "com.googlecode.iterm2",
    "io.alacritty",
    "org.alacritty",
    "net.kovidgoyal.kitty",
    "com.github.wez.wezterm",
    "co.zeit.hyper",
    "dev.warp.warp-stable",
    "com.mitchellh.ghostty",
    "gnome-terminal-server",
    "gnome-terminal",
    "konsole",
    "xterm",
    "urxvt",
    "alacritty",
    "kitty",
    "wezterm-gui",
    "tilix",
    "terminator",
    "foot",
    "ghostty",
    "windowsterminal.exe",
];

pub const BROWSER_APPS: &[&str] = &[
    "com.apple.safari",
    "com.google.chrome",
    "org.mozilla.firefox",
    "com.microsoft.edgemac",
    "com.brave.browser",
    "company.thebrowser.browser",
    "com.operasoftware.opera",
    "com.vivaldi.vivaldi",
    "firefox",
    "firefox-esr",
    "chrome",
    "chromium",
    "google-chrome",
    "brave",
    "msedge",
    // Embedded web runtimes
    "com.tinyspeck.slackmacgap",
    "com.microsoft.vscode",
    "com.hnc.discord",
    "notion.id",
    "md.obsidian",
    "com.spotify.client",
    "slack",
    "code",
    "discord",
    "obsidian",
];

pub const VIRTUALIZATION_APPS: &[&str] = &[
    "com.parallels.desktop.console",
    "com.vmware.fusion",
    "com.microsoft.rdc.macos",
    "com.utmapp.utm",
    "org.virtualbox.app.virtualboxvm",
    "com.citrix.receiver.icaviewer.mac",
    "com.realvnc.vncviewer",
    "virtualboxvm",
    "vmware",
    "vmplayer",
    "remmina",
    "vncviewer",
    "xfreerdp",
    "virt-viewer",
    "mstsc.exe",
];

pub const RESTRICTED_INPUT_APPS: &[&str] = &[
    "com.1password.1password",
    "com.agilebits.onepassword7",
    "com.bitwarden.desktop",
    "org.keepassxc.keepassxc",
    "com.apple.keychainaccess",
    "keepassxc",
    "1password",
    "bitwarden",
];

fn in_table(table: &[&str], app: &AppIdentity) -> bool {
    let id = app.id.to_lowercase();
    table.iter().any(|entry| *entry == id)
}

/// Facts the classification rules are applied to.
#[derive(Debug, Clone, Default)]
pub struct FocusSnapshot {
    pub app: Option<AppIdentity>,
    pub secure_input: bool,
    pub fullscreen: bool,
    pub composing: bool,
    pub remote_shell: bool,
}

/// Apply the classification rules to a snapshot of focus metadata.
pub fn classify_snapshot(snapshot: &FocusSnapshot) -> AppContext {
    if snapshot.composing {
        return AppContext::Composing;
    }
    if snapshot.secure_input {
        return AppContext::RestrictedInput;
    }

    let Some(app) = snapshot.app.as_ref() else {
        return if snapshot.fullscreen {
            AppContext::Game
        } else {
            AppContext::Standard
        };
    };

    if in_table(RESTRICTED_INPUT_APPS, app) {
        AppContext::RestrictedInput
    } else if in_table(TERMINAL_APPS, app) {
        if snapshot.remote_shell {
            AppContext::RemoteShell
        } else {
            AppContext::Terminal
        }
    } else if in_table(BROWSER_APPS, app) {
        AppContext::Browser
    } else if in_table(VIRTUALIZATION_APPS, app) {
        AppContext::Virtualization
    } else if snapshot.fullscreen {
        AppContext::Game
    } else {
        AppContext::Standard
    }
}

/// Result of classifying the focused target.
#[derive(Debug, Clone)]
pub struct Classification {
    pub context: AppContext,
    pub app: Option<AppIdentity>,
}

/// Classifies whatever currently has keyboard focus.
#[derive(Clone)]
pub struct AppContextClassifier {
    focus: Arc<dyn FocusMetadataSource>,
    inspector: ProcessInspector,
}

impl AppContextClassifier {
    pub fn new(focus: Arc<dyn FocusMetadataSource>) -> Self {
        Self {
            focus,
            inspector: ProcessInspector,
        }
    }

    /// Gather the focus facts needed for classification.
    ///
    /// The process table is only scanned when a terminal is focused, and the
    /// fullscreen check only runs for applications no table recognises.
    pub fn snapshot(&self) -> FocusSnapshot {
        let composing = self.focus.composition_active();
        let secure_input = self.focus.secure_input_active();
        let app = self.focus.frontmost_app();

        let mut snapshot = FocusSnapshot {
            app,
            secure_input,
            composing,
            ..Default::default()
        };
        if composing || secure_input {
            return snapshot;
        }

        match snapshot.app.as_ref() {
            Some(app) if in_table(TERMINAL_APPS, app) => {
                snapshot.remote_shell = app
                    .pid
                    .map(|pid| self.inspector.has_remote_shell_under(pid))
                    .unwrap_or(false);
            }
            Some(app)
                if in_table(BROWSER_APPS, app)
                    || in_table(VIRTUALIZATION_APPS, app)
                    || in_table(RESTRICTED_INPUT_APPS, app) => {}
            _ => snapshot.fullscreen = self.focus.frontmost_is_fullscreen(),
        }
        snapshot
    }

    pub fn classify(&self) -> Classification {
        let snapshot = self.snapshot();
        let context = classify_snapshot(&snapshot);
        tracing::trace!(
            context = %context,
            app = ?snapshot.app.as_ref().map(|app| app.id.as_str()),
            "Classified focused application"
        );
        Classification {
            context,
            app: snapshot.app,
        }
    }
}

impl fmt::Debug for AppContextClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContextClassifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::NullFocusSource;

    struct FixedFocus {
        app: Option<AppIdentity>,
        secure: bool,
        fullscreen: bool,
        composing: bool,
    }

    impl FocusMetadataSource for FixedFocus {
        fn frontmost_app(&self) -> Option<AppIdentity> {
            self.app.clone()
        }
        fn secure_input_active(&self) -> bool {
            self.secure
        }
        fn frontmost_is_fullscreen(&self) -> bool {
            self.fullscreen
        }
        fn composition_active(&self) -> bool {
            self.composing
        }
    }

    fn classify(app: Option<&str>, secure: bool, fullscreen: bool, composing: bool) -> AppContext {
        let classifier = AppContextClassifier::new(Arc::new(FixedFocus {
            app: app.map(AppIdentity::new),
            secure,
            fullscreen,
            composing,
        }));
        classifier.classify().context
    }

    #[test]
    fn test_known_tables() {
        assert_eq!(classify(Some("com.apple.Terminal"), false, false, false), AppContext::Terminal);
        assert_eq!(classify(Some("com.google.Chrome"), false, false, false), AppContext::Browser);
        assert_eq!(classify(Some("com.microsoft.VSCode"), false, false, false), AppContext::Browser);
        assert_eq!(
            classify(Some("com.vmware.fusion"), false, false, false),
            AppContext::Virtualization
        );
        assert_eq!(classify(Some("com.apple.TextEdit"), false, false, false), AppContext::Standard);
        assert_eq!(
            classify(Some("com.bitwarden.desktop"), false, false, false),
            AppContext::RestrictedInput
        );
    }

    #[test]
    fn test_secure_input_overrides_category() {
        assert_eq!(
            classify(Some("com.google.Chrome"), true, false, false),
            AppContext::RestrictedInput
        );
    }

    #[test]
    fn test_composition_overrides_everything() {
        assert_eq!(
            classify(Some("com.apple.TextEdit"), true, true, true),
            AppContext::Composing
        );
    }

    #[test]
    fn test_fullscreen_unknown_app_is_game() {
        assert_eq!(classify(Some("com.example.shooter"), false, true, false), AppContext::Game);
        assert_eq!(classify(None, false, true, false), AppContext::Game);
        // A fullscreen browser stays a browser.
        assert_eq!(classify(Some("com.apple.Safari"), false, true, false), AppContext::Browser);
    }

    #[test]
    fn test_remote_shell_snapshot() {
        let snapshot = FocusSnapshot {
            app: Some(AppIdentity::new("com.googlecode.iterm2").with_pid(42)),
            remote_shell: true,
            ..Default::default()
        };
        assert_eq!(classify_snapshot(&snapshot), AppContext::RemoteShell);
    }

    #[test]
    fn test_shells_paste_with_shifted_chord() {
        assert_eq!(AppContext::Terminal.timing_profile().paste_chord, PasteChord::Shifted);
        assert_eq!(AppContext::RemoteShell.timing_profile().paste_chord, PasteChord::Shifted);
        assert_eq!(AppContext::Standard.timing_profile().paste_chord, PasteChord::Standard);
        assert_eq!(AppContext::Browser.timing_profile().paste_chord, PasteChord::Standard);
    }

    #[test]
    fn test_null_source_is_standard() {
        let classifier = AppContextClassifier::new(Arc::new(NullFocusSource));
        assert_eq!(classifier.classify().context, AppContext::Standard);
    }

    #[test]
    fn test_suppression() {
        assert!(AppContext::RestrictedInput.should_suppress_expansion());
        assert!(AppContext::Game.should_suppress_expansion());
        assert!(AppContext::Composing.should_suppress_expansion());
        assert!(!AppContext::Standard.should_suppress_expansion());
        assert!(!AppContext::Browser.should_suppress_expansion());
    }

    #[test]
    fn test_slow_targets_get_larger_delays() {
        let standard = AppContext::Standard.timing_profile();
        for slow in [AppContext::Browser, AppContext::Virtualization, AppContext::RemoteShell] {
            let profile = slow.timing_profile();
            assert!(profile.deletion_inter_key_delay > standard.deletion_inter_key_delay);
            assert!(profile.injection_settle_delay > standard.injection_settle_delay);
            assert!(profile.use_simple_deletion);
        }
        assert!(!standard.use_simple_deletion);
    }
}
