//! Answer agent: one tool-free model call that condenses research into a final answer.

use std::sync::Arc;

use scout_core::{ChatMessage, ChatModel, ChatRequest, Config, ResearchTranscript, ScoutError, Task};
use tracing::{info, instrument};

use crate::agent_context::{AgentContext, AgentRole};

const DEFAULT_MAX_TOKENS: u32 = 1024;

pub const NO_RESEARCH_PLACEHOLDER: &str = "(no research was performed)";
pub const UNAVAILABLE_ANSWER: &str =
    "The necessary information to provide an answer is not available.";

const ANSWER_INSTRUCTIONS: &str = "\
You are an answer synthesis agent. Extract the exact answer to the original task \
from the research findings and reply with that answer only.

Rules:
- Be concise and direct. No explanations, no meta-commentary, do not restate the question.
- Follow the exact format the task asks for (dates, lists, ordering, capitalisation).
- Numbers: write numerals, not words. No units or thousands separators unless requested.
- Do not wrap the answer in quotes.
- If asked for a single item (e.g. \"the oldest\"), give only that item.
- Use partial information when it is enough to answer.
- Only when nothing relevant was found, reply exactly: \
The necessary information to provide an answer is not available.";

/// Produces the final answer from a task and its research transcript.
pub struct AnswerAgent {
    model: Arc<dyn ChatModel>,
    temperature: Option<f32>,
    max_tokens: u32,
}

impl AnswerAgent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            temperature: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn from_config(model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self::new(model).with_sampling(config.llm.temperature, config.llm.max_tokens)
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn role(&self) -> AgentRole {
        AgentRole::Answer
    }

    pub fn build_request(&self, task: &Task, transcript: &ResearchTranscript) -> ChatRequest {
        ChatRequest::new(ANSWER_INSTRUCTIONS)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .push(ChatMessage::user(answer_input(task, transcript)))
    }

    #[instrument(skip_all, fields(run_id = %context.run_id, role = %self.role(), model = %self.model.model_name()))]
    pub async fn synthesise(
        &self,
        context: &AgentContext,
        transcript: &ResearchTranscript,
    ) -> Result<String, ScoutError> {
        let request = self.build_request(&context.task, transcript);
        let completion = self
            .model
            .complete(&request)
            .await
            .map_err(|err| ScoutError::Synthesis(err.to_string()))?;

        let answer = completion.text.trim();
        if answer.is_empty() {
            return Err(ScoutError::Synthesis(
                "answer model returned an empty completion".to_string(),
            ));
        }

        info!(chars = answer.chars().count(), "answer ready");
        context.observer.answer_ready(answer);
        Ok(answer.to_string())
    }
}

/// User turn handed to the answer model.
pub fn answer_input(task: &Task, transcript: &ResearchTranscript) -> String {
    let research = if transcript.is_empty() {
        NO_RESEARCH_PLACEHOLDER.to_string()
    } else {
        transcript.render()
    };
    format!(
        "Original Task: {}\n\nResearch Transcript:\n{research}\n\n\
         Based on the research above, provide a clear, concise answer to the original task.",
        task.question()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::testing::ScriptedChatModel;

    #[test]
    fn empty_transcript_uses_placeholder() {
        let text = answer_input(&Task::new("What is 2 + 2?"), &ResearchTranscript::new());
        assert_eq!(
            text,
            "Original Task: What is 2 + 2?\n\nResearch Transcript:\n(no research was performed)\n\n\
             Based on the research above, provide a clear, concise answer to the original task."
        );
    }

    #[test]
    fn instructions_carry_format_rules_and_fallback() {
        assert!(ANSWER_INSTRUCTIONS.contains("numerals, not words"));
        assert!(ANSWER_INSTRUCTIONS.ends_with(UNAVAILABLE_ANSWER));
    }

    #[tokio::test]
    async fn answer_is_trimmed() {
        let agent = AnswerAgent::new(Arc::new(ScriptedChatModel::new(["  4\n"])));
        let context = AgentContext::detached(Task::new("What is 2 + 2?"));
        let answer = agent
            .synthesise(&context, &ResearchTranscript::new())
            .await
            .unwrap();
        assert_eq!(answer, "4");
    }

    #[tokio::test]
    async fn empty_or_failed_completion_is_a_synthesis_error() {
        let context = AgentContext::detached(Task::new("What is 2 + 2?"));

        let blank = AnswerAgent::new(Arc::new(ScriptedChatModel::new(["   "])));
        let err = blank
            .synthesise(&context, &ResearchTranscript::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Synthesis(_)));

        let failing = AnswerAgent::new(Arc::new(ScriptedChatModel::failing(503, "overloaded")));
        let err = failing
            .synthesise(&context, &ResearchTranscript::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Synthesis(_)));
    }
}
