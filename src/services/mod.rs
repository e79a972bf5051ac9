//! Collaborator Services
//!
//! Every subsystem the orchestrator schedules is reached through a trait
//! object in [`Services`]. The bundle is built once at startup and handed
//! to the orchestrator, which passes clones of the relevant `Arc`s into
//! hooks, jobs and background tasks.

pub mod standalone;
pub mod traits;

pub use standalone::Standalone;
pub use traits::{
    ChatFacade, ChatStreamService, EmojiService, MemoryService, MessageProcessor, MessageSender,
    MoodService, RelationshipService, ScheduleService, StatisticsService, StorageService,
    WillingnessService,
};

use std::sync::Arc;

/// Handles to every collaborator service
#[derive(Clone)]
pub struct Services {
    pub storage: Arc<dyn StorageService>,
    pub emoji: Arc<dyn EmojiService>,
    pub mood: Arc<dyn MoodService>,
    pub schedule: Arc<dyn ScheduleService>,
    pub relationships: Arc<dyn RelationshipService>,
    pub willingness: Arc<dyn WillingnessService>,
    pub sender: Arc<dyn MessageSender>,
    pub processor: Arc<dyn MessageProcessor>,
    pub chat_streams: Arc<dyn ChatStreamService>,
    pub memory: Arc<dyn MemoryService>,
    pub statistics: Arc<dyn StatisticsService>,
    pub chat: Arc<dyn ChatFacade>,
}

impl Services {
    /// Route every collaborator to one in-process implementation
    pub fn standalone() -> Self {
        let s = Arc::new(Standalone::new());
        Self {
            storage: s.clone(),
            emoji: s.clone(),
            mood: s.clone(),
            schedule: s.clone(),
            relationships: s.clone(),
            willingness: s.clone(),
            sender: s.clone(),
            processor: s.clone(),
            chat_streams: s.clone(),
            memory: s.clone(),
            statistics: s.clone(),
            chat: s,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
