//! Collaborator Service Traits
//!
//! Interfaces the orchestrator calls into. Implementations live with the
//! subsystems themselves; nothing here knows how moods are scored or how
//! the memory graph is built.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::event::{BotHandle, GroupMessageEvent};

/// Persistent storage connection
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Connect using the given parameters. An error here is fatal.
    async fn initialize(&self, config: &StorageConfig) -> Result<()>;
}

/// Emoji collection and classification
#[async_trait]
pub trait EmojiService: Send + Sync {
    /// Synchronous setup, run during bootstrap
    fn initialize(&self) -> Result<()>;

    /// Long-running loop that re-checks stored emoji every `interval_mins`
    async fn start_periodic_check(&self, interval_mins: u64) -> Result<()>;

    /// Long-running loop that registers newly seen emoji images
    async fn periodic_registration_scan(&self, interval_mins: u64) -> Result<()>;
}

/// Evolving emotional state
pub trait MoodService: Send + Sync {
    /// Begin the self-update timer
    fn start_mood_update(&self, interval: Duration) -> Result<()>;

    /// Emit the current mood snapshot
    fn print_mood_status(&self);
}

/// Daily schedule generator
#[async_trait]
pub trait ScheduleService: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    fn print_schedule(&self);
}

/// Per-user relationship records
#[async_trait]
pub trait RelationshipService: Send + Sync {
    /// Load every stored relationship into memory
    async fn load_all_relationships(&self) -> Result<()>;

    /// Background maintenance loop
    async fn run_maintenance(&self) -> Result<()>;
}

/// Reply willingness scoring
#[async_trait]
pub trait WillingnessService: Send + Sync {
    /// Start the scoring loop; calling it again is a no-op
    async fn ensure_started(&self) -> Result<()>;
}

/// Outbound message sending
pub trait MessageSender: Send + Sync {
    /// Bind the live transport connection
    fn set_bot(&self, bot: Arc<dyn BotHandle>);
}

/// Outbound message queue processing
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Long-running queue drain. Must be started at most once per process.
    async fn start_processor(&self) -> Result<()>;
}

/// Per-conversation stream state
#[async_trait]
pub trait ChatStreamService: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    /// Long-running periodic persistence
    async fn auto_save_task(&self) -> Result<()>;
}

/// Memory graph operations (the hippocampus)
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Build memory from the most recent `chat_size` conversational units
    async fn operation_build_memory(&self, chat_size: usize) -> Result<()>;

    /// Decay a `percentage` (0.0-1.0) of stored topics
    async fn operation_forget_topic(&self, percentage: f64) -> Result<()>;
}

/// LLM usage statistics collection
pub trait StatisticsService: Send + Sync {
    /// Begin collecting, writing reports to `output`
    fn start(&self, output: &Path) -> Result<()>;
}

/// Chat handling facade receiving every group message
#[async_trait]
pub trait ChatFacade: Send + Sync {
    async fn handle_message(&self, event: &GroupMessageEvent, bot: Arc<dyn BotHandle>) -> Result<()>;
}
