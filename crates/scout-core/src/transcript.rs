//! Run-scoped data: the task, the research transcript and how research ended.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::tools::{ToolInvocation, ToolResult, render_result};
use crate::ToolError;

/// A user question, optionally tied to a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    question: String,
    attachment: Option<PathBuf>,
}

impl Task {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// Text handed to the research agent. Mentions the attachment when present.
    pub fn prompt(&self) -> String {
        match &self.attachment {
            None => self.question.clone(),
            Some(path) => format!(
                "Task: {question}\n\n\
                 Associated file: {path}\n\n\
                 IMPORTANT: The file path provided is: {path}\n\
                 Use the file_read tool to examine this file before answering. \
                 If the file cannot be read, look for the information online instead.",
                question = self.question,
                path = path.display(),
            ),
        }
    }
}

/// One transcript record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// A tool call and its outcome.
    ToolCall {
        step: usize,
        invocation: ToolInvocation,
        result: ToolResult,
    },
    /// A directive that named an unknown tool or carried bad arguments.
    Rejected {
        step: usize,
        directive: String,
        error: ToolError,
    },
    /// Free-form note from the research agent, e.g. its closing summary.
    Note { text: String },
}

/// Ordered record of one research phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchTranscript {
    entries: Vec<TranscriptEntry>,
}

impl ResearchTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn record_call(&mut self, step: usize, invocation: ToolInvocation, result: ToolResult) {
        self.push(TranscriptEntry::ToolCall {
            step,
            invocation,
            result,
        });
    }

    pub fn record_rejected(&mut self, step: usize, directive: impl Into<String>, error: ToolError) {
        self.push(TranscriptEntry::Rejected {
            step,
            directive: directive.into(),
            error,
        });
    }

    pub fn record_note(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.trim().is_empty() {
            self.push(TranscriptEntry::Note {
                text: text.trim().to_string(),
            });
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Tool calls made so far, rejected directives included.
    pub fn tool_calls(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry, TranscriptEntry::Note { .. }))
            .count()
    }

    /// Plain-text rendering handed to the answer agent.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                TranscriptEntry::ToolCall {
                    step,
                    invocation,
                    result,
                } => {
                    let _ = writeln!(out, "[{step}] {}", invocation.describe());
                    let _ = writeln!(out, "{}", render_result(result));
                }
                TranscriptEntry::Rejected {
                    step,
                    directive,
                    error,
                } => {
                    let _ = writeln!(out, "[{step}] rejected directive: {directive}");
                    let _ = writeln!(out, "Error ({}): {error}", error.kind());
                }
                TranscriptEntry::Note { text } => {
                    let _ = writeln!(out, "Research notes:\n{text}");
                }
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// How the research phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The model signalled it was done.
    Completed,
    /// The tool-call ceiling was hit first.
    LoopLimitReached { limit: usize },
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Completed => "completed",
            Termination::LoopLimitReached { .. } => "loop_limit_reached",
        }
    }
}
