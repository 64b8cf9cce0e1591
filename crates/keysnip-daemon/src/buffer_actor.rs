//! The single writer of the rolling input buffer.
//!
//! Keystrokes, inactivity expiry, job completion and snapshot requests all
//! arrive as [`BufferCommand`]s on one channel and are applied in order on
//! the actor thread. Matching also runs here, against a snapshot of the
//! command index, so the OS callback never waits on it.

use crate::job::{JobGuard, JobOutcome, JobSlot, JobState, JobStateHandle, ReplacementJob};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use keysnip_core::{AppContextClassifier, CommandMatcher, InputBuffer, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// After a job that sent keystrokes, input is dropped for this long. The
/// hook can deliver the engine's own trailing backspaces and arrow keys
/// after the job reports back.
pub(crate) const SYNTHETIC_ECHO_WINDOW: Duration = Duration::from_millis(75);

/// Why the buffer was emptied from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// Caret moved by a navigation key or a click.
    Navigation,
    /// A key was pressed with a shortcut modifier held.
    Shortcut,
}

pub enum BufferCommand {
    Append(char),
    RemoveLast,
    Clear(ClearReason),
    JobFinished { outcome: JobOutcome, guard: JobGuard },
    Snapshot(Sender<String>),
    Shutdown,
}

pub(crate) struct BufferActor {
    buffer: InputBuffer,
    matcher: Arc<CommandMatcher>,
    classifier: AppContextClassifier,
    slot: JobSlot,
    job_state: JobStateHandle,
    jobs: Sender<ReplacementJob>,
    clear_after_expansion: bool,
    echo_until: Option<Instant>,
}

impl BufferActor {
    pub(crate) fn new(
        buffer: InputBuffer,
        matcher: Arc<CommandMatcher>,
        classifier: AppContextClassifier,
        slot: JobSlot,
        job_state: JobStateHandle,
        jobs: Sender<ReplacementJob>,
        clear_after_expansion: bool,
    ) -> Self {
        Self {
            buffer,
            matcher,
            classifier,
            slot,
            job_state,
            jobs,
            clear_after_expansion,
            echo_until: None,
        }
    }

    pub(crate) fn spawn(self, commands: Receiver<BufferCommand>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("keysnip-buffer".to_string())
            .spawn(move || self.run(commands))?;
        Ok(handle)
    }

    fn run(mut self, commands: Receiver<BufferCommand>) {
        tracing::debug!(capacity = self.buffer.capacity(), "Buffer actor started");
        loop {
            // The inactivity timer is disarmed while a job holds the buffer.
            let deadline = if self.slot.is_busy() {
                None
            } else {
                self.buffer.deadline()
            };

            let received = match deadline {
                Some(deadline) => commands.recv_deadline(deadline),
                None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            let command = match received {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => {
                    if self.buffer.expire_if_idle(Instant::now()) {
                        tracing::trace!("Input buffer expired after inactivity");
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            if !self.handle(command) {
                break;
            }
        }
        tracing::debug!("Buffer actor stopped");
    }

    /// Apply one command. Returns `false` when the actor should exit.
    fn handle(&mut self, command: BufferCommand) -> bool {
        let now = Instant::now();
        match command {
            BufferCommand::Append(c) => {
                if self.frozen(now) {
                    return true;
                }
                self.buffer.append(c, now);
                self.check_for_match();
            }
            BufferCommand::RemoveLast => {
                if !self.frozen(now) {
                    self.buffer.remove_last(now);
                }
            }
            BufferCommand::Clear(reason) => {
                if !self.frozen(now) && !self.buffer.is_empty() {
                    tracing::trace!(?reason, "Clearing input buffer");
                    self.buffer.clear();
                }
            }
            BufferCommand::JobFinished { outcome, guard } => {
                self.finish_job(outcome, now);
                drop(guard);
            }
            BufferCommand::Snapshot(reply) => {
                let _ = reply.send(self.buffer.snapshot());
            }
            BufferCommand::Shutdown => return false,
        }
        true
    }

    /// Keystrokes are ignored while a job is in flight and briefly after it
    /// edited the target. They are either the engine's own synthesized edits
    /// or typing the job would clobber.
    fn frozen(&mut self, now: Instant) -> bool {
        if self.slot.is_busy() {
            return true;
        }
        match self.echo_until {
            Some(until) if now < until => {
                tracing::trace!("Dropping keystroke echoed from replacement");
                true
            }
            Some(_) => {
                self.echo_until = None;
                false
            }
            None => false,
        }
    }

    fn check_for_match(&mut self) {
        let text = self.buffer.snapshot();
        let Some(found) = self.matcher.find_longest_suffix_match(&text) else {
            return;
        };

        let classification = self.classifier.classify();
        if classification.context.should_suppress_expansion() {
            tracing::debug!(
                command = %found.snippet.command,
                context = %classification.context,
                "Suppressing expansion for focused target"
            );
            return;
        }

        let Some(guard) = self.slot.try_acquire() else {
            tracing::debug!(command = %found.snippet.command, "Replacement already in flight");
            return;
        };

        tracing::debug!(
            command = %found.snippet.command,
            matched_len = found.matched_len,
            context = %classification.context,
            "Command matched"
        );
        self.job_state.set(JobState::Matched);

        let job = ReplacementJob {
            snippet: found.snippet,
            matched_len: found.matched_len,
            resolved_content: None,
            context: classification.context,
            app: classification.app,
            guard,
        };
        if self.jobs.send(job).is_err() {
            // The job and its guard come back inside the error and are dropped.
            tracing::warn!("Replacement worker gone; dropping match");
            self.job_state.set(JobState::Idle);
        }
    }

    fn finish_job(&mut self, outcome: JobOutcome, now: Instant) {
        match outcome {
            JobOutcome::Completed { matched_len } => {
                if self.clear_after_expansion {
                    self.buffer.clear();
                } else {
                    self.buffer.remove_suffix(matched_len, now);
                }
                self.echo_until = Some(now + SYNTHETIC_ECHO_WINDOW);
            }
            JobOutcome::Cancelled => {
                // Untouched, with a fresh inactivity window.
                self.buffer.touch(now);
            }
            JobOutcome::Failed(_) => {
                self.buffer.clear();
                self.echo_until = Some(now + SYNTHETIC_ECHO_WINDOW);
            }
        }
    }
}
