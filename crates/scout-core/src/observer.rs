//! Hooks for watching a run as it happens.
//!
//! Tools and agents report progress to a [`RunObserver`]. The CLI composes a
//! [`TracingObserver`] (log lines) with an
//! [`EventCollector`](crate::EventCollector) (trace file).

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::tools::{ToolInvocation, ToolResult, render_result};
use crate::{Termination, preview, redact_secrets};

const LOG_PREVIEW_CHARS: usize = 200;

pub trait RunObserver: Send + Sync {
    fn tool_started(&self, _step: usize, _invocation: &ToolInvocation) {}

    fn tool_finished(
        &self,
        _step: usize,
        _invocation: &ToolInvocation,
        _result: &ToolResult,
        _elapsed: Duration,
    ) {
    }

    /// Raw research-model output for one turn.
    fn decision(&self, _step: usize, _raw: &str) {}

    fn research_finished(&self, _termination: &Termination, _tool_calls: usize) {}

    fn answer_ready(&self, _answer: &str) {}
}

/// Tool argument with secrets redacted, flattened and cut to `max_chars`.
pub(crate) fn loggable_argument(invocation: &ToolInvocation, max_chars: usize) -> String {
    preview(&redact_secrets(invocation.argument()), max_chars)
}

/// Call-style rendering of [`loggable_argument`], e.g. `web_search("capital of France")`.
pub(crate) fn loggable_call(invocation: &ToolInvocation, max_chars: usize) -> String {
    format!(
        "{}({:?})",
        invocation.name(),
        loggable_argument(invocation, max_chars)
    )
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Emits structured log lines for each run milestone.
///
/// Tool calls are logged at `info` when `verbose` is set and at `debug`
/// otherwise; secrets are redacted from every logged argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver {
    verbose: bool,
}

impl TracingObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl RunObserver for TracingObserver {
    fn tool_started(&self, step: usize, invocation: &ToolInvocation) {
        let call = loggable_call(invocation, LOG_PREVIEW_CHARS);
        if self.verbose {
            info!(step, tool = invocation.name(), call = %call, "calling tool");
        } else {
            debug!(step, tool = invocation.name(), call = %call, "calling tool");
        }
    }

    fn tool_finished(
        &self,
        step: usize,
        invocation: &ToolInvocation,
        result: &ToolResult,
        elapsed: Duration,
    ) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match result {
            Ok(_) => {
                let output = redact_secrets(&preview(&render_result(result), LOG_PREVIEW_CHARS));
                if self.verbose {
                    info!(step, tool = invocation.name(), elapsed_ms, output = %output, "tool returned");
                } else {
                    debug!(step, tool = invocation.name(), elapsed_ms, output = %output, "tool returned");
                }
            }
            Err(err) => {
                warn!(
                    step,
                    tool = invocation.name(),
                    elapsed_ms,
                    kind = err.kind(),
                    error = %redact_secrets(&err.to_string()),
                    "tool failed"
                );
            }
        }
    }

    fn decision(&self, step: usize, raw: &str) {
        debug!(step, output = %redact_secrets(&preview(raw, LOG_PREVIEW_CHARS)), "research model replied");
    }

    fn research_finished(&self, termination: &Termination, tool_calls: usize) {
        match termination {
            Termination::Completed => info!(tool_calls, "research completed"),
            Termination::LoopLimitReached { limit } => {
                warn!(tool_calls, limit, "research stopped at tool-call limit")
            }
        }
    }

    fn answer_ready(&self, answer: &str) {
        info!(answer = %preview(answer, LOG_PREVIEW_CHARS), "answer synthesised");
    }
}

/// Fans every notification out to a list of observers, in order.
#[derive(Clone, Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn RunObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<dyn RunObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl RunObserver for CompositeObserver {
    fn tool_started(&self, step: usize, invocation: &ToolInvocation) {
        for observer in &self.observers {
            observer.tool_started(step, invocation);
        }
    }

    fn tool_finished(
        &self,
        step: usize,
        invocation: &ToolInvocation,
        result: &ToolResult,
        elapsed: Duration,
    ) {
        for observer in &self.observers {
            observer.tool_finished(step, invocation, result, elapsed);
        }
    }

    fn decision(&self, step: usize, raw: &str) {
        for observer in &self.observers {
            observer.decision(step, raw);
        }
    }

    fn research_finished(&self, termination: &Termination, tool_calls: usize) {
        for observer in &self.observers {
            observer.research_finished(termination, tool_calls);
        }
    }

    fn answer_ready(&self, answer: &str) {
        for observer in &self.observers {
            observer.answer_ready(answer);
        }
    }
}
