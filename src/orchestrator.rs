//! Lifecycle & Job Orchestrator
//!
//! Decides *when* each collaborator runs:
//! - **Bootstrap**: storage (fatal on failure), emoji setup, chat handler
//!   registration, recurring jobs
//! - **Startup hooks**: background services and relationship loading, run
//!   concurrently and at most once
//! - **Transport connect**: bind the transport, start the message processor
//!   exactly once across reconnects, launch per-connection scans
//! - **Dispatch**: forward every group message to the chat facade
//!
//! Background work goes through the [`TaskSupervisor`] so failures are
//! reported instead of dropped.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{OrchestratorError, Result};
use crate::event::{BotHandle, ConversationState, GroupMessageEvent};
use crate::jobs;
use crate::router::{MessageHandler, MessageRouter};
use crate::scheduler::JobScheduler;
use crate::services::{ChatFacade, Services};
use crate::start_guard::StartGuard;
use crate::supervisor::{TaskFailure, TaskSupervisor};

/// Dispatch priority of the chat handler
pub const CHAT_HANDLER_PRIORITY: u8 = 5;

/// Router name of the chat handler
pub const CHAT_HANDLER_NAME: &str = "chat";

/// Outcome of the two startup hooks
#[derive(Debug)]
pub struct StartupReport {
    pub background_tasks: Result<()>,
    pub relationships: Result<()>,
}

impl StartupReport {
    pub fn is_ok(&self) -> bool {
        self.background_tasks.is_ok() && self.relationships.is_ok()
    }
}

/// Wires host lifecycle events to the collaborator services
pub struct Orchestrator {
    config: Config,
    services: Services,
    scheduler: Arc<JobScheduler>,
    router: Arc<MessageRouter>,
    supervisor: Arc<TaskSupervisor>,
    bootstrap_guard: StartGuard,
    startup_guard: StartGuard,
    processor_guard: StartGuard,
}

impl Orchestrator {
    /// Create an orchestrator with its own scheduler and router.
    ///
    /// Returns the receiving end of the background failure channel.
    pub fn new(config: Config, services: Services) -> (Self, mpsc::UnboundedReceiver<TaskFailure>) {
        Self::with_host(
            config,
            services,
            Arc::new(JobScheduler::new()),
            Arc::new(MessageRouter::new()),
        )
    }

    /// Create an orchestrator that registers into an existing scheduler and router
    pub fn with_host(
        config: Config,
        services: Services,
        scheduler: Arc<JobScheduler>,
        router: Arc<MessageRouter>,
    ) -> (Self, mpsc::UnboundedReceiver<TaskFailure>) {
        let (supervisor, failures) = TaskSupervisor::new();
        let orchestrator = Self {
            config,
            services,
            scheduler,
            router,
            supervisor: Arc::new(supervisor),
            bootstrap_guard: StartGuard::new("bootstrap"),
            startup_guard: StartGuard::new("startup_hooks"),
            processor_guard: StartGuard::new("message_processor"),
        };
        (orchestrator, failures)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn supervisor(&self) -> &Arc<TaskSupervisor> {
        &self.supervisor
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrap_guard.is_started()
    }

    pub fn processor_started(&self) -> bool {
        self.processor_guard.is_started()
    }

    /// Process startup sequence.
    ///
    /// Storage failure aborts before anything is registered. A failed
    /// bootstrap may be retried; a successful one may not be repeated.
    pub async fn bootstrap(&self) -> Result<()> {
        let claim = self
            .bootstrap_guard
            .try_claim()
            .ok_or(OrchestratorError::AlreadyBootstrapped)?;

        self.services
            .storage
            .initialize(&self.config.storage)
            .await
            .map_err(|e| OrchestratorError::StorageInit(format!("{:#}", e)))?;
        info!(db = %self.config.storage.db_name, "Database initialized");

        self.services
            .emoji
            .initialize()
            .map_err(|e| OrchestratorError::hook("bootstrap", e))?;

        debug!("Waking {}...", self.config.bot.nickname);
        self.router.register(
            CHAT_HANDLER_NAME,
            CHAT_HANDLER_PRIORITY,
            Arc::new(ChatHandler {
                chat: self.services.chat.clone(),
            }),
        );

        jobs::register_jobs(
            &self.scheduler,
            &self.config.bot,
            self.services.memory.clone(),
            self.services.mood.clone(),
        );

        claim.commit();
        info!(jobs = self.scheduler.len(), "Bootstrap complete");
        Ok(())
    }

    /// Run both startup hooks concurrently, once per process
    pub async fn on_startup(&self) -> Result<StartupReport> {
        if !self.is_bootstrapped() {
            return Err(OrchestratorError::NotBootstrapped);
        }
        let claim = self
            .startup_guard
            .try_claim()
            .ok_or(OrchestratorError::AlreadyStarted)?;

        let (background_tasks, relationships) =
            tokio::join!(self.start_background_tasks(), self.init_relationships());
        claim.commit();

        if let Err(e) = &background_tasks {
            error!("Startup hook failed: {}", e);
        }
        if let Err(e) = &relationships {
            error!("Startup hook failed: {}", e);
        }

        Ok(StartupReport {
            background_tasks,
            relationships,
        })
    }

    /// Startup hook: statistics, mood updates, emoji checks, daily schedule
    pub async fn start_background_tasks(&self) -> Result<()> {
        const HOOK: &str = "start_background_tasks";
        let bot = &self.config.bot;

        self.services
            .statistics
            .start(&bot.llm_stats_file)
            .map_err(|e| OrchestratorError::hook(HOOK, e))?;
        info!(output = %bot.llm_stats_file.display(), "LLM statistics started");

        self.services
            .mood
            .start_mood_update(bot.mood_update_interval)
            .map_err(|e| OrchestratorError::hook(HOOK, e))?;
        info!("Mood manager started");

        let emoji = self.services.emoji.clone();
        let interval_mins = bot.emoji_check_interval_mins;
        self.supervisor.spawn("emoji_periodic_check", async move {
            emoji.start_periodic_check(interval_mins).await
        });

        self.services
            .schedule
            .initialize()
            .await
            .map_err(|e| OrchestratorError::hook(HOOK, e))?;
        self.services.schedule.print_schedule();

        Ok(())
    }

    /// Startup hook: load relationships, then keep them maintained
    pub async fn init_relationships(&self) -> Result<()> {
        debug!("Loading relationship data...");
        self.services
            .relationships
            .load_all_relationships()
            .await
            .map_err(|e| OrchestratorError::hook("init_relationships", e))?;

        let relationships = self.services.relationships.clone();
        self.supervisor.spawn("relationship_maintenance", async move {
            relationships.run_maintenance().await
        });
        Ok(())
    }

    /// Transport connected (fires again on every reconnect)
    pub async fn on_bot_connect(&self, bot: Arc<dyn BotHandle>) -> Result<()> {
        info!(bot = %bot.id(), "{} connected", self.config.bot.nickname);

        self.services
            .willingness
            .ensure_started()
            .await
            .map_err(|e| OrchestratorError::hook("bot_connect", e))?;

        self.services.sender.set_bot(bot.clone());
        info!("Message sender bound to transport");

        if let Some(claim) = self.processor_guard.try_claim() {
            let processor = self.services.processor.clone();
            self.supervisor.spawn("message_processor", async move {
                processor.start_processor().await
            });
            claim.commit();
            info!("Message processor started");
        } else {
            debug!("Message processor already running");
        }

        let emoji = self.services.emoji.clone();
        let interval_mins = self.config.bot.emoji_register_interval_mins;
        self.supervisor.spawn("emoji_registration_scan", async move {
            emoji.periodic_registration_scan(interval_mins).await
        });
        info!(interval_mins, "Emoji registration scan started");

        let streams = self.services.chat_streams.clone();
        self.supervisor.spawn("chat_stream_init", async move {
            streams.initialize().await
        });
        let streams = self.services.chat_streams.clone();
        self.supervisor.spawn("chat_stream_auto_save", async move {
            streams.auto_save_task().await
        });

        Ok(())
    }

    /// Group message dispatch through the router; returns how many
    /// handlers accepted the event
    pub async fn handle_group_message(
        &self,
        event: &GroupMessageEvent,
        bot: Arc<dyn BotHandle>,
        state: &mut ConversationState,
    ) -> usize {
        self.router.dispatch(event, bot, state).await
    }

    /// Stop recurring jobs and abort background tasks
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.supervisor.shutdown();
        info!("Orchestrator stopped");
    }
}

/// Router adapter for the chat facade
struct ChatHandler {
    chat: Arc<dyn ChatFacade>,
}

#[async_trait]
impl MessageHandler for ChatHandler {
    async fn handle(
        &self,
        event: &GroupMessageEvent,
        bot: Arc<dyn BotHandle>,
        _state: &mut ConversationState,
    ) -> anyhow::Result<()> {
        self.chat.handle_message(event, bot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_startup_requires_bootstrap() {
        let (orchestrator, _failures) = Orchestrator::new(Config::default(), Services::standalone());

        let err = orchestrator.on_startup().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NotBootstrapped));
    }

    #[tokio::test]
    async fn test_bootstrap_once() {
        let (orchestrator, _failures) = Orchestrator::new(Config::default(), Services::standalone());

        orchestrator.bootstrap().await.unwrap();
        assert!(orchestrator.is_bootstrapped());
        assert_eq!(
            orchestrator.router().handlers(),
            vec![(CHAT_HANDLER_NAME.to_string(), CHAT_HANDLER_PRIORITY)]
        );

        let err = orchestrator.bootstrap().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyBootstrapped));
        assert_eq!(orchestrator.router().handlers().len(), 1);

        orchestrator.shutdown();
    }

    #[tokio::test]
    async fn test_group_message_goes_through_router() {
        use crate::event::LocalBot;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counting(AtomicUsize);

        #[async_trait]
        impl MessageHandler for Counting {
            async fn handle(
                &self,
                _event: &GroupMessageEvent,
                _bot: Arc<dyn BotHandle>,
                _state: &mut ConversationState,
            ) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let (orchestrator, _failures) = Orchestrator::new(Config::default(), Services::standalone());
        let extra = Arc::new(Counting(AtomicUsize::new(0)));
        orchestrator.router().register("extra", 10, extra.clone());

        let event = GroupMessageEvent::text(100, 42, "hi");
        let mut state = ConversationState::new();
        let delivered = orchestrator
            .handle_group_message(&event, Arc::new(LocalBot::new("bot")), &mut state)
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(extra.0.load(Ordering::SeqCst), 1);
    }
}
