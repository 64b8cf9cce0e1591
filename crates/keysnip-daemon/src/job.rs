use keysnip_core::{AppContext, AppIdentity, KeysnipError, ResolvedContent, Snippet};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where the single in-flight replacement job currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Matched,
    Resolving,
    AwaitingInteractiveInput,
    Deleting,
    Injecting,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Idle => "idle",
            JobState::Matched => "matched",
            JobState::Resolving => "resolving",
            JobState::AwaitingInteractiveInput => "awaiting input",
            JobState::Deleting => "deleting",
            JobState::Injecting => "injecting",
        };
        f.write_str(label)
    }
}

/// Shared, readable view of the job state.
#[derive(Debug, Clone, Default)]
pub struct JobStateHandle(Arc<RwLock<JobState>>);

impl JobStateHandle {
    pub fn get(&self) -> JobState {
        *self.0.read()
    }

    pub(crate) fn set(&self, state: JobState) {
        let mut current = self.0.write();
        if *current != state {
            tracing::trace!(from = %*current, to = %state, "Job state transition");
            *current = state;
        }
    }
}

/// Reentrancy guard: at most one replacement job exists at a time.
#[derive(Debug, Clone, Default)]
pub struct JobSlot {
    busy: Arc<AtomicBool>,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if a job is already in flight.
    pub fn try_acquire(&self) -> Option<JobGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the lifetime of a job; releases the slot when dropped.
#[derive(Debug)]
pub struct JobGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// One accepted match on its way to the target.
#[derive(Debug)]
pub struct ReplacementJob {
    pub snippet: Arc<Snippet>,
    /// Characters to delete from the target before injecting.
    pub matched_len: usize,
    /// Filled in once keywords and metafields are resolved.
    pub resolved_content: Option<ResolvedContent>,
    pub context: AppContext,
    pub app: Option<AppIdentity>,
    pub(crate) guard: JobGuard,
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// The command was deleted and the content injected.
    Completed { matched_len: usize },
    /// The user dismissed the metafield prompt; nothing was touched.
    Cancelled,
    Failed(KeysnipError),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}
