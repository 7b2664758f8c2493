//! Event bus for run traces.
//!
//! [`EventCollector`] is a [`RunObserver`] that turns every notification into
//! an [`Event`] and sends it over an unbounded channel; the receiving end is
//! drained into a [`TraceCollector`](crate::TraceCollector) once the run ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::observer::loggable_argument;
use crate::tools::{ToolInvocation, ToolResult, render_result};
use crate::{RunObserver, Termination, preview, redact_secrets};

const EVENT_PREVIEW_CHARS: usize = 500;

/// Unique identifier for an event
pub type EventId = String;

/// Run lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Tool execution started
    ToolStarted {
        event_id: EventId,
        timestamp: DateTime<Utc>,
        step: usize,
        tool: String,
        argument: String,
    },
    /// Tool execution finished
    ToolFinished {
        event_id: EventId,
        timestamp: DateTime<Utc>,
        step: usize,
        tool: String,
        outcome: ToolOutcome,
        output: String,
        duration_ms: u64,
    },
    /// Raw research-model reply
    Decision {
        event_id: EventId,
        timestamp: DateTime<Utc>,
        step: usize,
        content: String,
    },
    /// Research phase ended
    ResearchFinished {
        event_id: EventId,
        timestamp: DateTime<Utc>,
        termination: Termination,
        tool_calls: usize,
    },
    /// Final answer produced
    Answer {
        event_id: EventId,
        timestamp: DateTime<Utc>,
        content: String,
    },
}

impl Event {
    pub fn event_id(&self) -> &str {
        match self {
            Event::ToolStarted { event_id, .. }
            | Event::ToolFinished { event_id, .. }
            | Event::Decision { event_id, .. }
            | Event::ResearchFinished { event_id, .. }
            | Event::Answer { event_id, .. } => event_id,
        }
    }

    /// Short label used by trace summaries.
    pub fn label(&self) -> String {
        match self {
            Event::ToolStarted { step, tool, .. } => format!("step {step} · {tool}"),
            Event::ToolFinished { step, tool, .. } => format!("step {step} · {tool}"),
            Event::Decision { step, .. } => format!("step {step} · decision"),
            Event::ResearchFinished { .. } => "research".to_string(),
            Event::Answer { .. } => "answer".to_string(),
        }
    }

    /// One-line description used by trace summaries.
    pub fn message(&self) -> String {
        match self {
            Event::ToolStarted { argument, .. } => format!("started ({argument})"),
            Event::ToolFinished {
                outcome,
                duration_ms,
                ..
            } => match outcome {
                ToolOutcome::Success => format!("ok in {duration_ms} ms"),
                ToolOutcome::Failure { kind, reason } => {
                    format!("{kind} in {duration_ms} ms: {reason}")
                }
            },
            Event::Decision { content, .. } => preview(content, 120),
            Event::ResearchFinished {
                termination,
                tool_calls,
                ..
            } => format!("{} after {tool_calls} tool call(s)", termination.label()),
            Event::Answer { content, .. } => preview(content, 120),
        }
    }
}

/// Outcome of a tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success,
    Failure { kind: String, reason: String },
}

impl From<&ToolResult> for ToolOutcome {
    fn from(result: &ToolResult) -> Self {
        match result {
            Ok(_) => ToolOutcome::Success,
            Err(err) => ToolOutcome::Failure {
                kind: err.kind().to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Observer that forwards run notifications as [`Event`]s.
#[derive(Clone)]
pub struct EventCollector {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventCollector {
    /// Create a new event collector
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn emit(&self, event: Event) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(error = %e, "Failed to emit trace event");
        }
    }
}

impl RunObserver for EventCollector {
    fn tool_started(&self, step: usize, invocation: &ToolInvocation) {
        self.emit(Event::ToolStarted {
            event_id: generate_event_id(),
            timestamp: Utc::now(),
            step,
            tool: invocation.name().to_string(),
            argument: loggable_argument(invocation, EVENT_PREVIEW_CHARS),
        });
    }

    fn tool_finished(
        &self,
        step: usize,
        invocation: &ToolInvocation,
        result: &ToolResult,
        elapsed: Duration,
    ) {
        self.emit(Event::ToolFinished {
            event_id: generate_event_id(),
            timestamp: Utc::now(),
            step,
            tool: invocation.name().to_string(),
            outcome: ToolOutcome::from(result),
            output: redact_secrets(&preview(&render_result(result), EVENT_PREVIEW_CHARS)),
            duration_ms: elapsed.as_millis() as u64,
        });
    }

    fn decision(&self, step: usize, raw: &str) {
        self.emit(Event::Decision {
            event_id: generate_event_id(),
            timestamp: Utc::now(),
            step,
            content: redact_secrets(raw),
        });
    }

    fn research_finished(&self, termination: &Termination, tool_calls: usize) {
        self.emit(Event::ResearchFinished {
            event_id: generate_event_id(),
            timestamp: Utc::now(),
            termination: *termination,
            tool_calls,
        });
    }

    fn answer_ready(&self, answer: &str) {
        self.emit(Event::Answer {
            event_id: generate_event_id(),
            timestamp: Utc::now(),
            content: answer.to_string(),
        });
    }
}

/// Generate a unique event ID
fn generate_event_id() -> EventId {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("evt_{}", id)
}
