//! In-process collaborator used when no backends are wired.
//!
//! Every call is logged and counted so the binary can run the full
//! lifecycle (hooks, jobs, dispatch) on a machine without a database or a
//! chat transport.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::traits::*;
use crate::config::StorageConfig;
use crate::event::{BotHandle, BotId, GroupMessageEvent};

/// Logging stand-in for every collaborator service
#[derive(Debug, Default)]
pub struct Standalone {
    willingness_started: AtomicBool,
    bound_bot: RwLock<Option<BotId>>,
    memory_builds: AtomicU64,
    topics_forgotten: AtomicU64,
    messages_seen: AtomicU64,
}

impl Standalone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bot bound by the last transport connect
    pub fn bound_bot(&self) -> Option<BotId> {
        self.bound_bot.read().clone()
    }

    pub fn messages_seen(&self) -> u64 {
        self.messages_seen.load(Ordering::Relaxed)
    }

    pub fn memory_builds(&self) -> u64 {
        self.memory_builds.load(Ordering::Relaxed)
    }

    pub fn topics_forgotten(&self) -> u64 {
        self.topics_forgotten.load(Ordering::Relaxed)
    }
}

async fn tick_forever(label: &'static str, every: Duration) -> Result<()> {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        interval.tick().await;
        debug!(task = label, "standalone tick");
    }
}

fn minutes(mins: u64) -> Duration {
    Duration::from_secs(mins.max(1).saturating_mul(60))
}

#[async_trait]
impl StorageService for Standalone {
    async fn initialize(&self, config: &StorageConfig) -> Result<()> {
        info!(host = %config.host, port = config.port, db = %config.db_name, "standalone storage ready (no connection made)");
        Ok(())
    }
}

#[async_trait]
impl EmojiService for Standalone {
    fn initialize(&self) -> Result<()> {
        debug!("standalone emoji service initialized");
        Ok(())
    }

    async fn start_periodic_check(&self, interval_mins: u64) -> Result<()> {
        tick_forever("emoji_check", minutes(interval_mins)).await
    }

    async fn periodic_registration_scan(&self, interval_mins: u64) -> Result<()> {
        tick_forever("emoji_register", minutes(interval_mins)).await
    }
}

impl MoodService for Standalone {
    fn start_mood_update(&self, interval: Duration) -> Result<()> {
        debug!(interval_secs = interval.as_secs_f64(), "standalone mood updates enabled");
        Ok(())
    }

    fn print_mood_status(&self) {
        info!(mood = "neutral", "mood status");
    }
}

#[async_trait]
impl ScheduleService for Standalone {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn print_schedule(&self) {
        info!("no daily schedule in standalone mode");
    }
}

#[async_trait]
impl RelationshipService for Standalone {
    async fn load_all_relationships(&self) -> Result<()> {
        debug!("standalone relationships: nothing to load");
        Ok(())
    }

    async fn run_maintenance(&self) -> Result<()> {
        tick_forever("relationship_maintenance", Duration::from_secs(300)).await
    }
}

#[async_trait]
impl WillingnessService for Standalone {
    async fn ensure_started(&self) -> Result<()> {
        if !self.willingness_started.swap(true, Ordering::SeqCst) {
            debug!("standalone willingness loop started");
        }
        Ok(())
    }
}

impl MessageSender for Standalone {
    fn set_bot(&self, bot: Arc<dyn BotHandle>) {
        *self.bound_bot.write() = Some(bot.id());
    }
}

#[async_trait]
impl MessageProcessor for Standalone {
    async fn start_processor(&self) -> Result<()> {
        tick_forever("message_processor", Duration::from_secs(1)).await
    }
}

#[async_trait]
impl ChatStreamService for Standalone {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn auto_save_task(&self) -> Result<()> {
        tick_forever("chat_stream_autosave", Duration::from_secs(300)).await
    }
}

#[async_trait]
impl MemoryService for Standalone {
    async fn operation_build_memory(&self, chat_size: usize) -> Result<()> {
        self.memory_builds.fetch_add(1, Ordering::Relaxed);
        debug!(chat_size, "standalone memory build");
        Ok(())
    }

    async fn operation_forget_topic(&self, percentage: f64) -> Result<()> {
        self.topics_forgotten.fetch_add(1, Ordering::Relaxed);
        debug!(percentage, "standalone topic decay");
        Ok(())
    }
}

impl StatisticsService for Standalone {
    fn start(&self, output: &Path) -> Result<()> {
        debug!(output = %output.display(), "standalone statistics not recorded");
        Ok(())
    }
}

#[async_trait]
impl ChatFacade for Standalone {
    async fn handle_message(&self, event: &GroupMessageEvent, bot: Arc<dyn BotHandle>) -> Result<()> {
        self.messages_seen.fetch_add(1, Ordering::Relaxed);
        info!(
            bot = %bot.id(),
            group = event.group_id,
            user = event.user_id,
            "group message: {}",
            event.plain_text
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LocalBot;

    #[tokio::test]
    async fn test_set_bot_and_dispatch_are_recorded() {
        let standalone = Standalone::new();
        let bot: Arc<dyn BotHandle> = Arc::new(LocalBot::new("10001"));

        standalone.set_bot(bot.clone());
        assert_eq!(standalone.bound_bot(), Some(BotId("10001".into())));

        let event = GroupMessageEvent::text(1, 2, "hello");
        standalone.handle_message(&event, bot).await.unwrap();
        assert_eq!(standalone.messages_seen(), 1);
    }

    #[tokio::test]
    async fn test_memory_builds_counted() {
        let standalone = Standalone::new();
        standalone.operation_build_memory(20).await.unwrap();
        standalone.operation_build_memory(20).await.unwrap();
        assert_eq!(standalone.memory_builds(), 2);
    }

    #[tokio::test]
    async fn test_topics_forgotten_counted() {
        let standalone = Standalone::new();
        standalone.operation_forget_topic(0.1).await.unwrap();
        assert_eq!(standalone.topics_forgotten(), 1);
    }

    #[test]
    fn test_minutes_saturates() {
        assert_eq!(minutes(0), Duration::from_secs(60));
        assert_eq!(minutes(u64::MAX), Duration::from_secs(u64::MAX));
    }
}
