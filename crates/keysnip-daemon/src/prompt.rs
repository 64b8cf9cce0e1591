use keysnip_core::resolver::default_values;
use keysnip_core::{Metafield, MetafieldPromptKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What the user did with the metafield prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    /// Final value for each field key.
    Commit(HashMap<String, String>),
    Cancelled,
}

/// Asks the user for metafield values. Blocks until the user commits or
/// cancels; it is only ever called from the replacement worker.
pub trait MetafieldPrompt: Send + Sync {
    fn prompt(&self, fields: &[Metafield]) -> PromptResponse;

    /// Dismiss an open prompt and answer every later one with
    /// [`PromptResponse::Cancelled`]. Called when the engine stops.
    fn cancel(&self) {}
}

/// Commits every field's default without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultsPrompt;

impl MetafieldPrompt for DefaultsPrompt {
    fn prompt(&self, fields: &[Metafield]) -> PromptResponse {
        PromptResponse::Commit(default_values(fields))
    }
}

/// Asks for each field in turn through a native dialog: `osascript` on
/// macOS, `zenity` on Linux, a VisualBasic input box on Windows.
///
/// Dismissing any dialog cancels the whole prompt.
#[derive(Debug, Default)]
pub struct SystemDialogPrompt {
    cancelled: AtomicBool,
    open: Mutex<Option<Child>>,
}

impl SystemDialogPrompt {
    fn ask(&self, field: &Metafield) -> Option<String> {
        let label = format!("Value for {}", field.key);
        let default = field.default_value.as_deref().unwrap_or("");

        let value = self.run_dialog(dialog_command(&label, default));
        if value.is_none() {
            tracing::debug!(field = %field.key, "Metafield dialog dismissed");
        }
        value
    }

    /// Run one dialog process and return what it printed, or `None` if it
    /// failed, was dismissed, or was killed by [`cancel`](MetafieldPrompt::cancel).
    fn run_dialog(&self, mut command: Command) -> Option<String> {
        let mut open = self.open.lock();
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        let mut child = match command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!(error = %err, "Could not open metafield dialog");
                return None;
            }
        };
        let stdout = child.stdout.take();
        *open = Some(child);
        drop(open);

        let mut output = Vec::new();
        if let Some(mut stdout) = stdout {
            if let Err(err) = stdout.read_to_end(&mut output) {
                tracing::debug!(error = %err, "Could not read metafield dialog output");
            }
        }

        let mut child = self.open.lock().take()?;
        let status = match child.wait() {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(error = %err, "Could not wait for metafield dialog");
                return None;
            }
        };
        if !status.success() || self.cancelled.load(Ordering::SeqCst) {
            return None;
        }

        let value = String::from_utf8_lossy(&output);
        Some(value.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl MetafieldPrompt for SystemDialogPrompt {
    fn prompt(&self, fields: &[Metafield]) -> PromptResponse {
        let mut values = HashMap::with_capacity(fields.len());
        for field in fields {
            match self.ask(field) {
                Some(value) => {
                    values.insert(field.key.clone(), value);
                }
                None => return PromptResponse::Cancelled,
            }
        }
        PromptResponse::Commit(values)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(child) = self.open.lock().as_mut() {
            if let Err(err) = child.kill() {
                tracing::debug!(error = %err, "Metafield dialog already closed");
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn dialog_command(label: &str, default: &str) -> Command {
    let script = format!(
        "text returned of (display dialog \"{}\" default answer \"{}\" with title \"keysnip\")",
        applescript_escape(label),
        applescript_escape(default)
    );
    let mut command = Command::new("osascript");
    command.arg("-e").arg(script);
    command
}

#[cfg(target_os = "windows")]
fn dialog_command(label: &str, default: &str) -> Command {
    let script = format!(
        "Add-Type -AssemblyName Microsoft.VisualBasic; \
         [Microsoft.VisualBasic.Interaction]::InputBox('{}', 'keysnip', '{}')",
        label.replace('\'', "''"),
        default.replace('\'', "''")
    );
    let mut command = Command::new("powershell");
    command.args(["-NoProfile", "-Command", &script]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn dialog_command(label: &str, default: &str) -> Command {
    let mut command = Command::new("zenity");
    command.args([
        "--entry",
        "--title",
        "keysnip",
        "--text",
        label,
        "--entry-text",
        default,
    ]);
    command
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build the prompt selected in the engine config.
pub fn prompt_for(kind: MetafieldPromptKind) -> Arc<dyn MetafieldPrompt> {
    match kind {
        MetafieldPromptKind::Dialog => Arc::new(SystemDialogPrompt::default()),
        MetafieldPromptKind::Defaults => Arc::new(DefaultsPrompt),
    }
}
