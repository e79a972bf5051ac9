//! Recurring memory and mood jobs

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::BotConfig;
use crate::scheduler::JobScheduler;
use crate::services::{MemoryService, MoodService};

pub const BUILD_MEMORY: &str = "build_memory";
pub const FORGET_MEMORY: &str = "forget_memory";
pub const MERGE_MEMORY: &str = "merge_memory";
pub const PRINT_MOOD: &str = "print_mood";

/// Conversational units fed into each memory build
pub const BUILD_MEMORY_CHAT_SIZE: usize = 20;
/// Share of topics decayed per forget run
pub const FORGET_TOPIC_PERCENTAGE: f64 = 0.1;
/// Mood snapshot cadence
pub const PRINT_MOOD_INTERVAL: Duration = Duration::from_secs(30);

/// Register the four recurring jobs. Existing jobs with the same ids are
/// replaced, so calling this twice leaves one copy of each.
pub fn register_jobs(
    scheduler: &JobScheduler,
    config: &BotConfig,
    memory: Arc<dyn MemoryService>,
    mood: Arc<dyn MoodService>,
) {
    let build_memory = memory.clone();
    scheduler.add_interval_job(BUILD_MEMORY, config.build_memory_interval, move || {
        build_memory_task(build_memory.clone())
    });

    let forget_memory = memory;
    scheduler.add_interval_job(FORGET_MEMORY, config.forget_memory_interval, move || {
        forget_memory_task(forget_memory.clone())
    });

    scheduler.add_interval_job(MERGE_MEMORY, config.merge_memory_interval(), merge_memory_task);

    scheduler.add_interval_job(PRINT_MOOD, PRINT_MOOD_INTERVAL, move || {
        let mood = mood.clone();
        async move {
            mood.print_mood_status();
            Ok(())
        }
    });
}

/// Build memory over the most recent conversation window
pub async fn build_memory_task(memory: Arc<dyn MemoryService>) -> Result<()> {
    let started_at = chrono::Utc::now();
    let started = Instant::now();
    info!(job = BUILD_MEMORY, started_at = %started_at.to_rfc3339(), "Building memory");

    memory.operation_build_memory(BUILD_MEMORY_CHAT_SIZE).await?;

    info!(
        job = BUILD_MEMORY,
        finished_at = %chrono::Utc::now().to_rfc3339(),
        elapsed_secs = %format!("{:.2}", started.elapsed().as_secs_f64()),
        "Memory build complete"
    );
    Ok(())
}

/// Decay a fixed share of memory topics
pub async fn forget_memory_task(memory: Arc<dyn MemoryService>) -> Result<()> {
    info!(job = FORGET_MEMORY, "Forgetting memory");
    memory.operation_forget_topic(FORGET_TOPIC_PERCENTAGE).await?;
    info!(job = FORGET_MEMORY, "Memory forgetting complete");
    Ok(())
}

/// Memory consolidation slot. Registered on the schedule but performs no
/// work: the memory service exposes no merge operation yet.
pub async fn merge_memory_task() -> Result<()> {
    debug!(job = MERGE_MEMORY, "merge slot elapsed; nothing to do");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_constants() {
        assert_eq!(BUILD_MEMORY_CHAT_SIZE, 20);
        assert!((FORGET_TOPIC_PERCENTAGE - 0.1).abs() < f64::EPSILON);
        assert_eq!(PRINT_MOOD_INTERVAL, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_register_jobs_intervals() {
        let scheduler = JobScheduler::new();
        let services = crate::services::Services::standalone();
        let config = BotConfig {
            build_memory_interval: Duration::from_secs(45),
            forget_memory_interval: Duration::from_secs(90),
            ..BotConfig::default()
        };

        register_jobs(&scheduler, &config, services.memory.clone(), services.mood.clone());
        register_jobs(&scheduler, &config, services.memory, services.mood);

        assert_eq!(
            scheduler.job_ids(),
            vec![BUILD_MEMORY, FORGET_MEMORY, MERGE_MEMORY, PRINT_MOOD]
        );
        assert_eq!(scheduler.job_interval(BUILD_MEMORY), Some(Duration::from_secs(45)));
        assert_eq!(scheduler.job_interval(FORGET_MEMORY), Some(Duration::from_secs(90)));
        assert_eq!(scheduler.job_interval(MERGE_MEMORY), Some(Duration::from_secs(55)));
        assert_eq!(scheduler.job_interval(PRINT_MOOD), Some(Duration::from_secs(30)));
    }
}
