//! Recording collaborators shared by the integration tests

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use megbot::config::StorageConfig;
use megbot::services::*;
use megbot::{BotHandle, BotId, GroupMessageEvent, Services};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which collaborator calls should fail
#[derive(Debug, Default, Clone, Copy)]
pub struct Failures {
    pub storage: bool,
    pub relationships: bool,
    pub schedule: bool,
    pub emoji_scan: bool,
    pub build_memory: bool,
    pub willingness: bool,
}

/// Records every collaborator call in order
#[derive(Default)]
pub struct Recorder {
    pub fail: Failures,
    calls: Mutex<Vec<String>>,
    pub processor_starts: AtomicUsize,
    pub build_args: Mutex<Vec<usize>>,
    pub forget_args: Mutex<Vec<f64>>,
    pub mood_prints: AtomicUsize,
    pub handled: Mutex<Vec<(i64, BotId)>>,
    pub bound: Mutex<Vec<BotId>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(fail: Failures) -> Arc<Self> {
        Arc::new(Self {
            fail,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    /// Position of the first occurrence of `call`
    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls.lock().iter().position(|c| c == call)
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            storage: self.clone(),
            emoji: self.clone(),
            mood: self.clone(),
            schedule: self.clone(),
            relationships: self.clone(),
            willingness: self.clone(),
            sender: self.clone(),
            processor: self.clone(),
            chat_streams: self.clone(),
            memory: self.clone(),
            statistics: self.clone(),
            chat: self.clone(),
        }
    }
}

#[async_trait]
impl StorageService for Recorder {
    async fn initialize(&self, _config: &StorageConfig) -> Result<()> {
        self.record("storage.initialize");
        if self.fail.storage {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl EmojiService for Recorder {
    fn initialize(&self) -> Result<()> {
        self.record("emoji.initialize");
        Ok(())
    }

    async fn start_periodic_check(&self, _interval_mins: u64) -> Result<()> {
        self.record("emoji.start_periodic_check");
        Ok(())
    }

    async fn periodic_registration_scan(&self, _interval_mins: u64) -> Result<()> {
        self.record("emoji.periodic_registration_scan");
        if self.fail.emoji_scan {
            anyhow::bail!("image directory missing");
        }
        Ok(())
    }
}

impl MoodService for Recorder {
    fn start_mood_update(&self, _interval: Duration) -> Result<()> {
        self.record("mood.start_mood_update");
        Ok(())
    }

    fn print_mood_status(&self) {
        self.mood_prints.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScheduleService for Recorder {
    async fn initialize(&self) -> Result<()> {
        self.record("schedule.initialize");
        tokio::task::yield_now().await;
        if self.fail.schedule {
            anyhow::bail!("schedule model unavailable");
        }
        Ok(())
    }

    fn print_schedule(&self) {
        self.record("schedule.print_schedule");
    }
}

#[async_trait]
impl RelationshipService for Recorder {
    async fn load_all_relationships(&self) -> Result<()> {
        self.record("relationships.load_all");
        tokio::task::yield_now().await;
        if self.fail.relationships {
            anyhow::bail!("relationship collection unreadable");
        }
        Ok(())
    }

    async fn run_maintenance(&self) -> Result<()> {
        self.record("relationships.run_maintenance");
        Ok(())
    }
}

#[async_trait]
impl WillingnessService for Recorder {
    async fn ensure_started(&self) -> Result<()> {
        self.record("willingness.ensure_started");
        if self.fail.willingness {
            anyhow::bail!("willingness store offline");
        }
        Ok(())
    }
}

impl MessageSender for Recorder {
    fn set_bot(&self, bot: Arc<dyn BotHandle>) {
        self.record("sender.set_bot");
        self.bound.lock().push(bot.id());
    }
}

#[async_trait]
impl MessageProcessor for Recorder {
    async fn start_processor(&self) -> Result<()> {
        self.processor_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ChatStreamService for Recorder {
    async fn initialize(&self) -> Result<()> {
        self.record("chat_streams.initialize");
        Ok(())
    }

    async fn auto_save_task(&self) -> Result<()> {
        self.record("chat_streams.auto_save_task");
        Ok(())
    }
}

#[async_trait]
impl MemoryService for Recorder {
    async fn operation_build_memory(&self, chat_size: usize) -> Result<()> {
        self.build_args.lock().push(chat_size);
        if self.fail.build_memory {
            anyhow::bail!("memory graph locked");
        }
        Ok(())
    }

    async fn operation_forget_topic(&self, percentage: f64) -> Result<()> {
        self.forget_args.lock().push(percentage);
        Ok(())
    }
}

impl StatisticsService for Recorder {
    fn start(&self, _output: &Path) -> Result<()> {
        self.record("statistics.start");
        Ok(())
    }
}

#[async_trait]
impl ChatFacade for Recorder {
    async fn handle_message(&self, event: &GroupMessageEvent, bot: Arc<dyn BotHandle>) -> Result<()> {
        self.handled.lock().push((event.message_id, bot.id()));
        Ok(())
    }
}

/// Let spawned background tasks run to completion
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
