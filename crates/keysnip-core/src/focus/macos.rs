//! macOS focus metadata via NSWorkspace, Carbon and System Events.

use super::{AppIdentity, FocusMetadataSource};
use objc::runtime::{Class, Object};
use objc::{msg_send, sel, sel_impl};
use std::process::Command;

#[link(name = "Carbon", kind = "framework")]
extern "C" {
    fn IsSecureEventInputEnabled() -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MacOSFocusSource;

impl MacOSFocusSource {
    pub fn new() -> Self {
        Self
    }
}

impl FocusMetadataSource for MacOSFocusSource {
    fn frontmost_app(&self) -> Option<AppIdentity> {
        get_frontmost_app()
    }

    fn secure_input_active(&self) -> bool {
        unsafe { IsSecureEventInputEnabled() }
    }

    fn frontmost_is_fullscreen(&self) -> bool {
        let script = r#"
            tell application "System Events"
                set frontApp to first application process whose frontmost is true
                try
                    return value of attribute "AXFullScreen" of front window of frontApp
                end try
            end tell
            return false
        "#;

        Command::new("osascript")
            .args(["-e", script])
            .output()
            .map(|output| {
                output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true"
            })
            .unwrap_or(false)
    }

    fn composition_active(&self) -> bool {
        // Marked text of other processes is not observable from here.
        false
    }
}

/// Get the frontmost application using native Cocoa APIs.
fn get_frontmost_app() -> Option<AppIdentity> {
    unsafe {
        let workspace_class = Class::get("NSWorkspace")?;

        let shared_workspace: *mut Object = msg_send![workspace_class, sharedWorkspace];
        if shared_workspace.is_null() {
            return None;
        }

        let frontmost_app: *mut Object = msg_send![shared_workspace, frontmostApplication];
        if frontmost_app.is_null() {
            return None;
        }

        let bundle_id_ns: *mut Object = msg_send![frontmost_app, bundleIdentifier];
        let bundle_id = nsstring_to_string(bundle_id_ns)?;
        if bundle_id.is_empty() {
            return None;
        }

        let name_ns: *mut Object = msg_send![frontmost_app, localizedName];
        let pid: i32 = msg_send![frontmost_app, processIdentifier];

        Some(AppIdentity {
            id: bundle_id,
            name: nsstring_to_string(name_ns),
            pid: u32::try_from(pid).ok(),
        })
    }
}

unsafe fn nsstring_to_string(nsstring: *mut Object) -> Option<String> {
    if nsstring.is_null() {
        return None;
    }

    let c_str: *const std::os::raw::c_char = msg_send![nsstring, UTF8String];
    if c_str.is_null() {
        return None;
    }

    let rust_str = std::ffi::CStr::from_ptr(c_str).to_str().ok()?;
    Some(rust_str.to_string())
}
