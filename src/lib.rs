//! MegBot Orchestrator
//!
//! Lifecycle hooks and recurring jobs for a group chat bot.
//!
//! # Features
//!
//! - **Bootstrap**: storage, emoji setup, chat handler and job registration
//! - **Startup Hooks**: statistics, mood, daily schedule, relationships
//! - **Connect Hook**: transport binding, single-start message processor
//! - **Recurring Jobs**: memory build/forget/merge, mood snapshots
//! - **Supervision**: background task failures are reported, never dropped
//!
//! # Architecture
//!
//! ```text
//! Host events ──► Orchestrator ──► Services (storage, emoji, mood, ...)
//!                   │
//!                   ├── MessageRouter (group messages, by priority)
//!                   ├── JobScheduler  (build/forget/merge memory, print mood)
//!                   └── TaskSupervisor (background loops + failure channel)
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod jobs;
pub mod orchestrator;
pub mod router;
pub mod scheduler;
pub mod services;
pub mod start_guard;
pub mod supervisor;

pub use config::{BotConfig, Config, StorageConfig};
pub use error::OrchestratorError;
pub use event::{BotHandle, BotId, ConversationState, GroupMessageEvent, LocalBot};
pub use orchestrator::{Orchestrator, StartupReport, CHAT_HANDLER_PRIORITY};
pub use router::{MessageHandler, MessageRouter};
pub use scheduler::{JobOutcome, JobScheduler, JobStatsSnapshot};
pub use services::Services;
pub use start_guard::{StartGuard, StartState};
pub use supervisor::{TaskFailure, TaskSupervisor};
