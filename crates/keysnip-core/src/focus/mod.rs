//! Foreground application metadata.
//!
//! The classifier only needs a handful of facts about whatever has keyboard
//! focus. [`FocusMetadataSource`] abstracts where they come from so the
//! classification rules stay pure and testable.

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessesToUpdate, System};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
pub use linux::X11FocusSource;
#[cfg(target_os = "macos")]
pub use macos::MacOSFocusSource;

#[cfg(target_os = "linux")]
pub type PlatformFocusSource = X11FocusSource;
#[cfg(target_os = "macos")]
pub type PlatformFocusSource = MacOSFocusSource;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub type PlatformFocusSource = NullFocusSource;

/// Identity of the focused application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    /// Bundle ID on macOS (e.g. "com.apple.Terminal"), process name elsewhere.
    pub id: String,
    pub name: Option<String>,
    pub pid: Option<u32>,
}

impl AppIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            pid: None,
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Provider of "what has focus right now" facts.
pub trait FocusMetadataSource: Send + Sync {
    fn frontmost_app(&self) -> Option<AppIdentity>;

    /// Whether the OS reports secure text entry (password fields and the like).
    fn secure_input_active(&self) -> bool;

    /// Whether the focused window covers the whole screen.
    fn frontmost_is_fullscreen(&self) -> bool;

    /// Whether an input method is holding uncommitted composition text.
    fn composition_active(&self) -> bool;
}

/// Source that knows nothing; everything classifies as standard.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFocusSource;

impl FocusMetadataSource for NullFocusSource {
    fn frontmost_app(&self) -> Option<AppIdentity> {
        None
    }

    fn secure_input_active(&self) -> bool {
        false
    }

    fn frontmost_is_fullscreen(&self) -> bool {
        false
    }

    fn composition_active(&self) -> bool {
        false
    }
}

/// Process names of remote shell clients.
pub const REMOTE_SHELL_CLIENTS: &[&str] = &[
    "ssh",
    "autossh",
    "mosh",
    "mosh-client",
    "telnet",
    "et",
    "tsh",
];

const MAX_ANCESTRY_DEPTH: usize = 32;

/// Inspects the process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInspector;

impl ProcessInspector {
    /// Whether a remote shell client runs somewhere below `pid` in the process tree.
    pub fn has_remote_shell_under(&self, pid: u32) -> bool {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        let root = Pid::from_u32(pid);

        sys.processes().values().any(|process| {
            let name = process.name().to_string_lossy();
            if !REMOTE_SHELL_CLIENTS.contains(&name.as_ref()) {
                return false;
            }

            let mut current = process.parent();
            for _ in 0..MAX_ANCESTRY_DEPTH {
                match current {
                    Some(parent) if parent == root => return true,
                    Some(parent) => current = sys.process(parent).and_then(|p| p.parent()),
                    None => return false,
                }
            }
            false
        })
    }

    /// Name of the process with the given PID.
    pub fn process_name(&self, pid: u32) -> Option<String> {
        let mut sys = System::new();
        let pid = Pid::from_u32(pid);
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid)
            .map(|process| process.name().to_string_lossy().into_owned())
    }
}
