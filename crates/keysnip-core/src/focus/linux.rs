//! X11 focus metadata through `xdotool` and `xprop`.
//!
//! Wayland compositors do not expose the focused window to clients, so on
//! Wayland every query comes back empty and targets classify as standard.

use super::{AppIdentity, FocusMetadataSource, ProcessInspector};
use std::process::Command;

#[derive(Debug, Default, Clone, Copy)]
pub struct X11FocusSource;

impl X11FocusSource {
    pub fn new() -> Self {
        Self
    }

    fn active_window() -> Option<String> {
        run("xdotool", &["getactivewindow"])
    }
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl FocusMetadataSource for X11FocusSource {
    fn frontmost_app(&self) -> Option<AppIdentity> {
        let window = Self::active_window()?;
        let pid: u32 = run("xdotool", &["getwindowpid", &window])?.parse().ok()?;
        let process = ProcessInspector.process_name(pid)?;
        let mut app = AppIdentity::new(process).with_pid(pid);
        if let Some(title) = run("xdotool", &["getwindowname", &window]) {
            app = app.with_name(title);
        }
        Some(app)
    }

    fn secure_input_active(&self) -> bool {
        // X11 has no system-wide secure input flag.
        false
    }

    fn frontmost_is_fullscreen(&self) -> bool {
        Self::active_window()
            .and_then(|window| run("xprop", &["-id", &window, "_NET_WM_STATE"]))
            .map(|state| state.contains("_NET_WM_STATE_FULLSCREEN"))
            .unwrap_or(false)
    }

    fn composition_active(&self) -> bool {
        false
    }
}
