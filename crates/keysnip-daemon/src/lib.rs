//! Runtime of the keysnip engine.
//!
//! Threads:
//! - the OS keystroke callback, which only forwards to channels;
//! - the buffer actor, sole owner of the input buffer, which also matches;
//! - the replacement worker, which runs at most one job at a time;
//! - the health supervisor, which keeps observation alive.

pub mod buffer_actor;
pub mod engine;
pub mod event_source;
pub mod health;
pub mod job;
pub mod keyboard_listener;
pub mod orchestrator;
pub mod permissions;
pub mod prompt;
pub mod usage;

pub use engine::{Engine, EngineParts};
pub use event_source::{DisableReason, KeystrokeEventSource, KeystrokeHandler, RdevEventSource};
pub use health::{HealthMonitor, ObservationStatus, RecoveryAction};
pub use job::{JobOutcome, JobSlot, JobState, ReplacementJob};
pub use orchestrator::{ReplacementOrchestrator, SynthFactory};
pub use permissions::{GrantedPermission, PermissionProbe, SystemPermissionProbe};
pub use prompt::{DefaultsPrompt, MetafieldPrompt, PromptResponse, SystemDialogPrompt};
pub use usage::{NoopUsage, UsageCounter, UsageSink};
