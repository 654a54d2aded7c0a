//! # Focusflow Core Library
//!
//! Business logic for the Focusflow focus timer: a session timer that runs
//! alternating focus and break segments, tracks time per activity, and keeps
//! history for statistics and backups. Front ends (the CLI, or any GUI shell)
//! are thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: a pure state machine ([`timer::reduce`]) plus the
//!   [`TimerOrchestrator`] that advances it from wall-clock ticks and turns
//!   its transitions into store writes, prompts, sounds and notifications
//! - **Collaborators**: the narrow traits the orchestrator talks to
//!   ([`SessionStore`], [`Notifier`], [`Presenter`], [`SoundPlayer`], [`Clock`])
//! - **Storage**: SQLite [`Database`] (also the production [`SessionStore`]),
//!   TOML [`Config`], JSON backups

pub mod collaborators;
pub mod error;
pub mod events;
pub mod storage;
#[doc(hidden)]
pub mod testing;
pub mod timer;

pub use collaborators::{
    Clock, NewSession, Notifier, Platform, Presenter, Prompt, PromptChoice, PromptKind,
    SessionStore, SoundClip, SoundPlayer, SystemClock,
};
pub use error::{
    ConfigError, CoreError, DatabaseError, NotifyError, StoreError, TimerError, ValidationError,
};
pub use events::Event;
pub use storage::{Config, Database, MemoryStore};
pub use timer::{DurationPlan, SegmentType, TimerOrchestrator, TimerState, TimerStatus};
