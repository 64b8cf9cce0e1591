//! Runs replacement jobs: resolve the content, delete the typed command,
//! inject the result through the clipboard, and put the clipboard back.

use crate::buffer_actor::BufferCommand;
use crate::job::{JobOutcome, JobState, JobStateHandle, ReplacementJob};
use crate::prompt::{MetafieldPrompt, PromptResponse};
use crate::usage::UsageSink;
use crossbeam_channel::{Receiver, Sender};
use keysnip_core::resolver::uses_clipboard;
use keysnip_core::{
    extract_metafields, resolve, ClipboardAccess, KeySynth, KeysnipError, KeywordContext,
    ResolvedContent, Result, TimingProfile,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Creates a keystroke synthesizer for one job.
pub type SynthFactory = Arc<dyn Fn() -> Result<Box<dyn KeySynth>> + Send + Sync>;

/// Time for the clipboard owner to publish new contents before pasting.
const CLIPBOARD_READY_DELAY: Duration = Duration::from_millis(20);

/// Pause between chunks of backspaces and between batches of cursor moves.
const BATCH_PAUSE: Duration = Duration::from_millis(5);

pub struct ReplacementOrchestrator {
    clipboard: Arc<dyn ClipboardAccess>,
    synth_factory: SynthFactory,
    prompt: Arc<dyn MetafieldPrompt>,
    usage: Arc<dyn UsageSink>,
    state: JobStateHandle,
    deletion_chunk_size: usize,
    cursor_batch_size: usize,
}

impl ReplacementOrchestrator {
    pub fn new(
        clipboard: Arc<dyn ClipboardAccess>,
        synth_factory: SynthFactory,
        prompt: Arc<dyn MetafieldPrompt>,
        usage: Arc<dyn UsageSink>,
        state: JobStateHandle,
    ) -> Self {
        Self {
            clipboard,
            synth_factory,
            prompt,
            usage,
            state,
            deletion_chunk_size: keysnip_core::config::DEFAULT_DELETION_CHUNK_SIZE,
            cursor_batch_size: keysnip_core::config::DEFAULT_CURSOR_BATCH_SIZE,
        }
    }

    pub fn with_batching(mut self, deletion_chunk_size: usize, cursor_batch_size: usize) -> Self {
        self.deletion_chunk_size = deletion_chunk_size.max(1);
        self.cursor_batch_size = cursor_batch_size.max(1);
        self
    }

    /// Run jobs until the job channel closes, reporting each outcome back to
    /// the buffer actor along with the job's guard.
    pub(crate) fn spawn(
        self,
        jobs: Receiver<ReplacementJob>,
        buffer: Sender<BufferCommand>,
    ) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("keysnip-replace".to_string())
            .spawn(move || {
                for mut job in jobs.iter() {
                    let outcome = self.run_job(&mut job);
                    let ReplacementJob { guard, .. } = job;
                    if buffer
                        .send(BufferCommand::JobFinished { outcome, guard })
                        .is_err()
                    {
                        tracing::trace!("Buffer actor gone; dropping job outcome");
                    }
                }
                tracing::debug!("Replacement worker stopped");
            })?;
        Ok(handle)
    }

    /// Drive one job to completion. Never panics; a panic inside the job is
    /// reported as a failure.
    pub fn run_job(&self, job: &mut ReplacementJob) -> JobOutcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(job)))
            .unwrap_or_else(|_| Err(KeysnipError::Other("replacement job panicked".to_string())));

        let outcome = match result {
            Ok(true) => JobOutcome::Completed {
                matched_len: job.matched_len,
            },
            Ok(false) => {
                tracing::info!(command = %job.snippet.command, "Expansion cancelled");
                JobOutcome::Cancelled
            }
            Err(err) => {
                tracing::error!(command = %job.snippet.command, error = %err, "Expansion failed");
                JobOutcome::Failed(err)
            }
        };
        self.state.set(JobState::Idle);
        outcome
    }

    /// Returns `Ok(false)` when the user cancelled before anything was touched.
    fn execute(&self, job: &mut ReplacementJob) -> Result<bool> {
        self.state.set(JobState::Resolving);
        let content = &job.snippet.content;

        let clipboard_text = if uses_clipboard(content) {
            self.clipboard.get_text().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Could not read clipboard for {{clipboard}}");
                None
            })
        } else {
            None
        };
        let ctx = KeywordContext::new(clipboard_text);

        let fields = extract_metafields(content);
        let values = if fields.is_empty() {
            None
        } else {
            self.state.set(JobState::AwaitingInteractiveInput);
            match self.prompt.prompt(&fields) {
                PromptResponse::Commit(values) => Some(values),
                PromptResponse::Cancelled => return Ok(false),
            }
        };

        let resolved = resolve(content, &ctx, values.as_ref());
        job.resolved_content = Some(resolved.clone());

        let profile = job.context.timing_profile();
        let mut synth = (self.synth_factory)()?;

        self.state.set(JobState::Deleting);
        self.delete_command(synth.as_mut(), job.matched_len, &profile)?;

        self.state.set(JobState::Injecting);
        if !resolved.text.is_empty() {
            self.inject(synth.as_mut(), &resolved, &profile)?;
        }

        self.usage.record_use(&job.snippet.id);
        tracing::info!(
            command = %job.snippet.command,
            context = %job.context,
            chars = resolved.char_len(),
            "Expanded snippet"
        );
        Ok(true)
    }

    fn delete_command(
        &self,
        synth: &mut dyn KeySynth,
        count: usize,
        profile: &TimingProfile,
    ) -> Result<()> {
        if profile.use_simple_deletion {
            for _ in 0..count {
                synth.backspace()?;
                thread::sleep(profile.deletion_inter_key_delay);
            }
            return Ok(());
        }

        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(self.deletion_chunk_size);
            for _ in 0..chunk {
                synth.backspace()?;
            }
            remaining -= chunk;
            if remaining > 0 {
                thread::sleep(BATCH_PAUSE.max(profile.deletion_inter_key_delay));
            }
        }
        Ok(())
    }

    /// Paste `resolved` through the clipboard, restoring the previous
    /// contents whether or not the paste went through.
    fn inject(
        &self,
        synth: &mut dyn KeySynth,
        resolved: &ResolvedContent,
        profile: &TimingProfile,
    ) -> Result<()> {
        let saved = self.clipboard.snapshot()?;

        if let Err(err) = self.clipboard.set_text(&resolved.text) {
            self.restore_clipboard(saved);
            return Err(err);
        }
        thread::sleep(CLIPBOARD_READY_DELAY);

        let pasted = synth.paste(profile.paste_chord);
        // The target reads the clipboard asynchronously after the shortcut.
        thread::sleep(profile.injection_settle_delay);
        self.restore_clipboard(saved);
        pasted?;

        self.move_cursor_left(synth, resolved.cursor_moves_left(), profile)
    }

    fn restore_clipboard(&self, saved: keysnip_core::ClipboardSnapshot) {
        if let Err(err) = self.clipboard.restore(saved) {
            tracing::warn!(error = %err, "Failed to restore clipboard");
        }
    }

    fn move_cursor_left(
        &self,
        synth: &mut dyn KeySynth,
        count: usize,
        profile: &TimingProfile,
    ) -> Result<()> {
        let mut remaining = count;
        while remaining > 0 {
            let batch = remaining.min(self.cursor_batch_size);
            for _ in 0..batch {
                synth.cursor_left()?;
            }
            remaining -= batch;
            if remaining > 0 {
                thread::sleep(BATCH_PAUSE.max(profile.deletion_inter_key_delay));
            }
        }
        Ok(())
    }
}
