//! Research-then-answer orchestration for a single task.

use std::sync::Arc;

use scout_core::{
    ChatModel, Config, NoopObserver, ResearchTranscript, RunObserver, ScoutError, Task,
    Termination, ToolBox,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::agent_context::AgentContext;
use crate::answer::AnswerAgent;
use crate::research::ResearchAgent;

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub answer: String,
    pub transcript: ResearchTranscript,
    pub termination: Termination,
}

/// Runs research then answer synthesis, strictly in sequence.
pub struct Pipeline {
    research: ResearchAgent,
    answer: AnswerAgent,
    observer: Arc<dyn RunObserver>,
}

impl Pipeline {
    pub fn new(research: ResearchAgent, answer: AnswerAgent) -> Self {
        Self {
            research,
            answer,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Wire both agents from configuration.
    ///
    /// `observer` receives agent notifications and is also attached to the tool box.
    pub fn from_config(
        config: &Config,
        research_model: Arc<dyn ChatModel>,
        answer_model: Arc<dyn ChatModel>,
        tools: ToolBox,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        let tools = Arc::new(tools.with_observer(observer.clone()));
        let research = ResearchAgent::from_config(research_model, tools, config);
        let answer = AnswerAgent::from_config(answer_model, config);
        Self::new(research, answer).with_observer(observer)
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn run(&self, task: Task) -> Result<RunReport, ScoutError> {
        self.run_with_id(task, Uuid::new_v4()).await
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn run_with_id(&self, task: Task, run_id: Uuid) -> Result<RunReport, ScoutError> {
        info!(task = %scout_core::preview(task.question(), 120), "run started");
        let context = AgentContext::new(task, self.observer.clone()).with_run_id(run_id);

        let research = self.research.run(&context).await?;
        let answer = self.answer.synthesise(&context, &research.transcript).await?;

        info!(termination = research.termination.label(), "run finished");
        Ok(RunReport {
            run_id,
            answer,
            transcript: research.transcript,
            termination: research.termination,
        })
    }
}
