//! Group Message Router
//!
//! Holds the handlers registered for inbound group messages and invokes
//! them in ascending priority order (lower number runs first).

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::event::{BotHandle, ConversationState, GroupMessageEvent};

/// A receiver of group message events
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        event: &GroupMessageEvent,
        bot: Arc<dyn BotHandle>,
        state: &mut ConversationState,
    ) -> Result<()>;
}

struct Registration {
    name: String,
    priority: u8,
    handler: Arc<dyn MessageHandler>,
}

/// Priority-ordered handler registry
#[derive(Default)]
pub struct MessageRouter {
    handlers: RwLock<Vec<Registration>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Handlers with equal priority run in
    /// registration order.
    pub fn register(&self, name: &str, priority: u8, handler: Arc<dyn MessageHandler>) {
        let mut handlers = self.handlers.write();
        let at = handlers.partition_point(|r| r.priority <= priority);
        handlers.insert(
            at,
            Registration {
                name: name.to_string(),
                priority,
                handler,
            },
        );
        debug!(handler = name, priority, "Registered group message handler");
    }

    /// Handler names with their priorities, in dispatch order
    pub fn handlers(&self) -> Vec<(String, u8)> {
        self.handlers
            .read()
            .iter()
            .map(|r| (r.name.clone(), r.priority))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Deliver an event to every handler. A failing handler is logged and
    /// does not stop delivery to the rest. Returns the number of handlers
    /// that succeeded.
    pub async fn dispatch(
        &self,
        event: &GroupMessageEvent,
        bot: Arc<dyn BotHandle>,
        state: &mut ConversationState,
    ) -> usize {
        let targets: Vec<(String, Arc<dyn MessageHandler>)> = self
            .handlers
            .read()
            .iter()
            .map(|r| (r.name.clone(), r.handler.clone()))
            .collect();

        let mut delivered = 0;
        for (name, handler) in targets {
            match handler.handle(event, bot.clone(), state).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    handler = %name,
                    group = event.group_id,
                    message_id = event.message_id,
                    "Message handler failed: {:#}",
                    e
                ),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LocalBot;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(
            &self,
            _event: &GroupMessageEvent,
            _bot: Arc<dyn BotHandle>,
            state: &mut ConversationState,
        ) -> Result<()> {
            self.log.lock().push(self.name);
            state.insert(self.name.to_string(), serde_json::json!(true));
            if self.fail {
                anyhow::bail!("{} refused", self.name);
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Arc<dyn MessageHandler> {
        Arc::new(Recorder {
            name,
            log: log.clone(),
            fail,
        })
    }

    #[tokio::test]
    async fn test_dispatch_in_priority_order() {
        let router = MessageRouter::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        router.register("late", 10, recorder("late", &log, false));
        router.register("chat", 5, recorder("chat", &log, false));
        router.register("early", 1, recorder("early", &log, false));
        router.register("chat_2", 5, recorder("chat_2", &log, false));

        let mut state = ConversationState::new();
        let event = GroupMessageEvent::text(1, 2, "hi");
        let delivered = router.dispatch(&event, Arc::new(LocalBot::new("b")), &mut state).await;

        assert_eq!(delivered, 4);
        assert_eq!(*log.lock(), vec!["early", "chat", "chat_2", "late"]);
        assert_eq!(state.len(), 4);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let router = MessageRouter::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        router.register("broken", 1, recorder("broken", &log, true));
        router.register("chat", 5, recorder("chat", &log, false));

        let mut state = ConversationState::new();
        let event = GroupMessageEvent::text(1, 2, "hi");
        let delivered = router.dispatch(&event, Arc::new(LocalBot::new("b")), &mut state).await;

        assert_eq!(delivered, 1);
        assert_eq!(*log.lock(), vec!["broken", "chat"]);
    }
}
