use crate::buffer_actor::{BufferActor, BufferCommand};
use crate::event_source::{KeystrokeEventSource, KeystrokeHandler, RdevEventSource};
use crate::health::{
    HealthCommand, HealthMonitor, HealthSupervisor, ObservationStatus, SharedEventSource,
};
use crate::job::{JobSlot, JobState, JobStateHandle};
use crate::keyboard_listener::KeystrokeRouter;
use crate::orchestrator::{ReplacementOrchestrator, SynthFactory};
use crate::permissions::{permission_instructions, PermissionProbe, SystemPermissionProbe};
use crate::prompt::{prompt_for, MetafieldPrompt};
use crate::usage::UsageSink;
use crossbeam_channel::{unbounded, Sender};
use keysnip_core::{
    AppContextClassifier, ClipboardAccess, CommandMatcher, EngineConfig, EnigoSynth,
    FocusMetadataSource, InputBuffer, KeySynth, KeysnipError, PlatformFocusSource, Result,
    Snippet, SystemClipboard,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long `buffer_snapshot` waits for the buffer actor.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(1);

/// The platform collaborators the engine runs against.
pub struct EngineParts {
    pub event_source: Box<dyn KeystrokeEventSource>,
    pub focus: Arc<dyn FocusMetadataSource>,
    pub clipboard: Arc<dyn ClipboardAccess>,
    pub synth_factory: SynthFactory,
    pub prompt: Arc<dyn MetafieldPrompt>,
    pub usage: Arc<dyn UsageSink>,
    pub permission: Arc<dyn PermissionProbe>,
}

impl EngineParts {
    /// The real thing: rdev, enigo, arboard, and the platform focus source.
    pub fn system(config: &EngineConfig, usage: Arc<dyn UsageSink>) -> Self {
        Self {
            event_source: Box::new(RdevEventSource::new()),
            focus: Arc::new(PlatformFocusSource::default()),
            clipboard: Arc::new(SystemClipboard::new()),
            synth_factory: Arc::new(|| Ok(Box::new(EnigoSynth::new()?) as Box<dyn KeySynth>)),
            prompt: prompt_for(config.metafield_prompt),
            usage,
            permission: Arc::new(SystemPermissionProbe),
        }
    }
}

struct Running {
    source: SharedEventSource,
    buffer_tx: Sender<BufferCommand>,
    health_tx: Sender<HealthCommand>,
    prompt: Arc<dyn MetafieldPrompt>,
    threads: Vec<JoinHandle<()>>,
}

/// The text-expansion engine.
///
/// Construct, [`start`](Engine::start), [`stop`](Engine::stop). Snippets can
/// be replaced at any time with [`update_snippets`](Engine::update_snippets).
pub struct Engine {
    config: EngineConfig,
    matcher: Arc<CommandMatcher>,
    slot: JobSlot,
    job_state: JobStateHandle,
    status: Arc<RwLock<ObservationStatus>>,
    permission: Arc<dyn PermissionProbe>,
    parts: Option<EngineParts>,
    running: Option<Running>,
}

impl Engine {
    pub fn new(config: EngineConfig, parts: EngineParts) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            matcher: Arc::new(CommandMatcher::new()),
            slot: JobSlot::new(),
            job_state: JobStateHandle::default(),
            status: Arc::new(RwLock::new(ObservationStatus::Inactive)),
            permission: Arc::clone(&parts.permission),
            parts: Some(parts),
            running: None,
        })
    }

    /// Replace the whole snippet set. Matching switches to the new set
    /// atomically; a query never sees a mix of old and new.
    pub fn update_snippets(&self, snippets: Vec<Snippet>) {
        self.matcher.rebuild(snippets);
    }

    pub fn snippet_count(&self) -> usize {
        self.matcher.snapshot().len()
    }

    /// Start observing keystrokes.
    ///
    /// Fails with [`KeysnipError::PermissionDenied`] when observation is not
    /// permitted; the engine stays inactive and `start` may be retried once
    /// the permission is granted.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(KeysnipError::EngineState("engine already running".to_string()));
        }
        if self.parts.is_none() {
            return Err(KeysnipError::EngineState("engine has been stopped".to_string()));
        }
        if !self.permission.is_permitted() {
            for line in permission_instructions() {
                tracing::warn!("{}", line);
            }
            return Err(KeysnipError::PermissionDenied(
                "keystroke observation is not permitted for this process".to_string(),
            ));
        }
        let Some(parts) = self.parts.take() else {
            return Err(KeysnipError::EngineState("engine has been stopped".to_string()));
        };

        let (buffer_tx, buffer_rx) = unbounded();
        let (job_tx, job_rx) = unbounded();
        let (health_tx, health_rx) = unbounded();
        let mut threads = Vec::with_capacity(3);

        let actor = BufferActor::new(
            InputBuffer::new(self.config.buffer_capacity, self.config.inactivity_timeout()),
            Arc::clone(&self.matcher),
            AppContextClassifier::new(parts.focus),
            self.slot.clone(),
            self.job_state.clone(),
            job_tx,
            self.config.clear_buffer_after_expansion,
        );
        threads.push(actor.spawn(buffer_rx)?);

        let prompt = Arc::clone(&parts.prompt);
        let orchestrator = ReplacementOrchestrator::new(
            parts.clipboard,
            parts.synth_factory,
            parts.prompt,
            parts.usage,
            self.job_state.clone(),
        )
        .with_batching(self.config.deletion_chunk_size, self.config.cursor_batch_size);
        let worker = match orchestrator.spawn(job_rx, buffer_tx.clone()) {
            Ok(worker) => worker,
            Err(err) => {
                let _ = buffer_tx.send(BufferCommand::Shutdown);
                join_all(threads);
                return Err(err);
            }
        };
        threads.push(worker);

        let router: Arc<dyn KeystrokeHandler> =
            Arc::new(KeystrokeRouter::new(buffer_tx.clone(), health_tx.clone()));
        let source: SharedEventSource = Arc::new(Mutex::new(parts.event_source));
        if let Err(err) = source.lock().start(router) {
            let _ = buffer_tx.send(BufferCommand::Shutdown);
            join_all(threads);
            return Err(err);
        }

        let supervisor = HealthSupervisor::new(
            Arc::clone(&source),
            HealthMonitor::new(self.config.failure_window(), self.config.quiet_period()),
            Arc::clone(&self.status),
            self.config.health_check_interval(),
        );
        match supervisor.spawn(health_rx) {
            Ok(handle) => threads.push(handle),
            Err(err) => {
                source.lock().stop();
                let _ = buffer_tx.send(BufferCommand::Shutdown);
                join_all(threads);
                return Err(err);
            }
        }

        *self.status.write() = ObservationStatus::Active;
        self.running = Some(Running {
            source,
            buffer_tx,
            health_tx,
            prompt,
            threads,
        });
        tracing::info!(snippets = self.snippet_count(), "Engine started");
        Ok(())
    }

    /// Stop observing and join the engine threads. An open metafield prompt
    /// is dismissed, so its job ends as cancelled; any other in-flight job
    /// runs to completion first. Idempotent.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.source.lock().stop();
        let _ = running.health_tx.send(HealthCommand::Shutdown);
        let _ = running.buffer_tx.send(BufferCommand::Shutdown);
        drop(running.buffer_tx);
        running.prompt.cancel();
        join_all(running.threads);

        *self.status.write() = ObservationStatus::Inactive;
        self.job_state.set(JobState::Idle);
        tracing::info!("Engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Current contents of the input buffer, or `None` when not running.
    pub fn buffer_snapshot(&self) -> Option<String> {
        let running = self.running.as_ref()?;
        let (reply_tx, reply_rx) = unbounded();
        running
            .buffer_tx
            .send(BufferCommand::Snapshot(reply_tx))
            .ok()?;
        reply_rx.recv_timeout(SNAPSHOT_TIMEOUT).ok()
    }

    pub fn job_state(&self) -> JobState {
        self.job_state.get()
    }

    /// Whether a replacement job is in flight.
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    pub fn observation_status(&self) -> ObservationStatus {
        *self.status.read()
    }

    pub fn recheck_permission(&self) -> bool {
        self.permission.is_permitted()
    }

    pub fn request_permission(&self) -> Result<()> {
        self.permission.request()
    }

    /// Ask the health supervisor to recreate observation, typically after
    /// it gave up and reported [`ObservationStatus::Fallback`].
    pub fn restart_observation(&self) -> Result<()> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| KeysnipError::EngineState("engine is not running".to_string()))?;
        running
            .health_tx
            .send(HealthCommand::Retry)
            .map_err(|_| KeysnipError::EngineState("health supervisor has exited".to_string()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_all(threads: Vec<JoinHandle<()>>) {
    for handle in threads {
        if handle.join().is_err() {
            tracing::error!("Engine thread panicked");
        }
    }
}
