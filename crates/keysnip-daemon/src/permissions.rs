use keysnip_core::Result;

/// Whether this process may observe keystrokes system-wide.
pub trait PermissionProbe: Send + Sync {
    fn is_permitted(&self) -> bool;

    /// Point the user at wherever the permission is granted. Does not wait
    /// for the grant.
    fn request(&self) -> Result<()>;
}

/// Probe for the current platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPermissionProbe;

impl PermissionProbe for SystemPermissionProbe {
    fn is_permitted(&self) -> bool {
        has_observation_permission()
    }

    fn request(&self) -> Result<()> {
        request_observation_permission()
    }
}

/// Always permitted. For platforms or tests where no grant is needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantedPermission;

impl PermissionProbe for GrantedPermission {
    fn is_permitted(&self) -> bool {
        true
    }

    fn request(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn has_observation_permission() -> bool {
    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn AXIsProcessTrusted() -> bool;
    }
    unsafe { AXIsProcessTrusted() }
}

#[cfg(target_os = "macos")]
fn request_observation_permission() -> Result<()> {
    let status = std::process::Command::new("open")
        .arg("x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility")
        .status()?;
    if !status.success() {
        tracing::warn!(%status, "Could not open System Settings");
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn has_observation_permission() -> bool {
    use std::path::Path;

    // rdev observes through the X server, which needs no extra grant.
    if std::env::var_os("DISPLAY").is_some() {
        return true;
    }

    let probe = Path::new("/dev/input/event0");
    if probe.exists() {
        return std::fs::File::open(probe).is_ok();
    }

    std::process::Command::new("groups")
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|groups| groups.split_whitespace().any(|group| group == "input"))
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
fn request_observation_permission() -> Result<()> {
    tracing::info!("Add your user to the 'input' group: sudo usermod -a -G input $USER");
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn has_observation_permission() -> bool {
    true
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn request_observation_permission() -> Result<()> {
    Ok(())
}

/// Human-readable steps for granting keystroke observation on this platform.
pub fn permission_instructions() -> Vec<String> {
    let host = host_application();
    let mut lines = Vec::new();

    #[cfg(target_os = "macos")]
    {
        lines.push("keysnip needs accessibility permission to observe keystrokes.".to_string());
        lines.push("1. Open System Settings > Privacy & Security > Accessibility".to_string());
        lines.push(format!("2. Find and check the box next to '{}'", host));
        lines.push("3. If it's already checked, uncheck and recheck it".to_string());
        lines.push(format!(
            "On macOS 14 or newer, also grant Input Monitoring to '{}'.",
            host
        ));
    }

    #[cfg(target_os = "linux")]
    {
        lines.push("keysnip needs to read input events to observe keystrokes.".to_string());
        lines.push("Run it inside an X11 session (DISPLAY must be set), or".to_string());
        lines.push("add your user to the 'input' group and log out and back in:".to_string());
        lines.push("   sudo usermod -a -G input $USER".to_string());
        lines.push(format!("Detected terminal: {}", host));
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        lines.push(format!(
            "You may see security warnings about {} accessing keyboard input.",
            host
        ));
        lines.push("Some antivirus programs block keyboard monitoring;".to_string());
        lines.push("if keysnip doesn't expand anything, check their settings.".to_string());
    }

    lines
}

/// Best guess at the application that launched us and needs the grant.
fn host_application() -> String {
    std::env::var("TERM_PROGRAM")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "your terminal application".to_string())
}
