//! Error types for the orchestrator

/// Errors raised by the orchestrator itself.
///
/// Collaborator services report failures as `anyhow::Error`; those are
/// flattened into the string payloads below when they cross into
/// orchestrator control flow.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Invalid configuration: {var}={value:?} ({reason})")]
    Config {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Storage initialization failed: {0}")]
    StorageInit(String),

    #[error("Orchestrator already bootstrapped")]
    AlreadyBootstrapped,

    #[error("Orchestrator not bootstrapped")]
    NotBootstrapped,

    #[error("Startup hooks already ran")]
    AlreadyStarted,

    #[error("Hook {hook} failed: {message}")]
    Hook { hook: &'static str, message: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),
}

impl OrchestratorError {
    /// Wrap a collaborator failure raised inside a lifecycle hook
    pub fn hook(hook: &'static str, err: anyhow::Error) -> Self {
        Self::Hook {
            hook,
            message: format!("{:#}", err),
        }
    }

    /// Whether the process must stop serving after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageInit(_) | Self::Config { .. })
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
