use std::fmt::Write as _;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Event;

/// Buffer of run events, filled from an [`EventCollector`](crate::EventCollector) channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceCollector {
    events: Vec<Event>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Take every event currently queued on `receiver` without waiting.
    pub fn drain(&mut self, receiver: &mut mpsc::UnboundedReceiver<Event>) -> usize {
        let before = self.events.len();
        while let Ok(event) = receiver.try_recv() {
            tracing::trace!(event_id = %event.event_id(), "Collected event");
            self.events.push(event);
        }
        self.events.len() - before
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary::from_events(&self.events)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub index: usize,
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSummary {
    pub steps: Vec<TraceStep>,
}

impl TraceSummary {
    /// Summarise events, skipping `ToolStarted` (its `ToolFinished` carries the outcome).
    pub fn from_events(events: &[Event]) -> Self {
        let steps = events
            .iter()
            .filter(|event| !matches!(event, Event::ToolStarted { .. }))
            .enumerate()
            .map(|(idx, event)| TraceStep {
                index: idx + 1,
                label: event.label(),
                message: event.message(),
            })
            .collect();
        Self { steps }
    }

    pub fn render_markdown(&self) -> String {
        if self.steps.is_empty() {
            return "No trace events recorded.".to_string();
        }
        let mut output = String::from("### Trace Summary\n");
        for step in &self.steps {
            let _ = writeln!(output, "{}. {} → {}", step.index, step.label, step.message);
        }
        output
    }
}

/// Write `events` as pretty JSON to `{dir}/{run_id}.json`, creating `dir` if needed.
pub fn persist_trace<P: AsRef<Path>>(dir: P, run_id: &str, events: &[Event]) -> Result<PathBuf> {
    let dir = dir.as_ref();
    create_dir_all(dir)
        .with_context(|| format!("failed to create trace directory {}", dir.display()))?;
    let path = dir.join(format!("{run_id}.json"));
    let payload = serde_json::to_vec_pretty(events)?;
    let mut file = File::create(&path)
        .with_context(|| format!("failed to create trace file {}", path.display()))?;
    file.write_all(&payload)
        .with_context(|| format!("failed to write trace file {}", path.display()))?;
    Ok(path)
}
