//! Scout core: configuration, errors, telemetry, the chat-model boundary and
//! the tool layer shared by the research and answer agents.
//!
//! Nothing in this crate drives a run; see `scout-agents` for the pipeline.

mod config;
mod error;
mod events;
mod llm;
mod observer;
mod security;
mod telemetry;
mod text;
mod trace;
mod transcript;

pub mod tools;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{
    Config, ConfigLoader, ConfigOverrides, LlmConfig, LoggingConfig, ResearchConfig, SearchConfig,
    ToolsConfig,
};
pub use error::{LlmError, ScoutError, ToolError};
pub use events::{Event, EventCollector, EventId, ToolOutcome};
pub use llm::{ChatMessage, ChatModel, ChatRequest, Completion, OpenAiChat, Role};
pub use observer::{CompositeObserver, NoopObserver, RunObserver, TracingObserver};
pub use security::{SecretValue, redact_secrets, require_var};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use text::{preview, truncate_chars};
pub use tools::{ToolBox, ToolInvocation, ToolOutput, ToolResult};
pub use trace::{TraceCollector, TraceStep, TraceSummary, persist_trace};
pub use transcript::{ResearchTranscript, Task, Termination, TranscriptEntry};
