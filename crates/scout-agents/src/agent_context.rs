//! Run-scoped context shared by the research and answer agents.

use std::fmt;
use std::sync::Arc;

use scout_core::{NoopObserver, RunObserver, Task};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Agent roles in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Research,
    Answer,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::Research => f.write_str("research"),
            AgentRole::Answer => f.write_str("answer"),
        }
    }
}

/// Context for agent execution
#[derive(Clone)]
pub struct AgentContext {
    pub run_id: Uuid,
    pub task: Task,
    pub observer: Arc<dyn RunObserver>,
}

impl AgentContext {
    pub fn new(task: Task, observer: Arc<dyn RunObserver>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task,
            observer,
        }
    }

    /// Context with a fresh run id and no observer.
    pub fn detached(task: Task) -> Self {
        Self::new(task, Arc::new(NoopObserver))
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("run_id", &self.run_id)
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}
