//! Research agent: LLM-driven tool loop that builds a transcript.

use std::fmt::Write as _;
use std::sync::Arc;

use scout_core::tools::{render_result, tool_catalog};
use scout_core::{
    ChatMessage, ChatModel, ChatRequest, Config, ResearchTranscript, ScoutError, Task, Termination,
    ToolBox, ToolInvocation, TranscriptEntry,
};
use tracing::{debug, info, instrument, warn};

use crate::agent_context::{AgentContext, AgentRole};
use crate::directive::Directive;

const DEFAULT_MAX_TOOL_CALLS: usize = 10;
const DEFAULT_MAX_TOKENS: u32 = 4096;

const RESEARCH_INSTRUCTIONS: &str = "\
You are a research agent that solves questions requiring multi-step lookup and reasoning.

Approach:
1. If the task mentions a local file, read it with file_read first.
2. Decide what information is missing and gather it with the tools below. \
Prefer web_search to find sources, then web_scrape to read the most promising page.
3. Cross-check important facts against more than one source when you can.
4. If a tool returns an error, adapt: rephrase the query, try another URL or another tool.
5. For questions you can answer by reasoning alone (arithmetic, logic), finish immediately.

When you have enough information, finish with a short summary of your findings, \
including the exact values, names or dates the question asks for.";

const REPLY_PROTOCOL: &str = "\
Reply with exactly one JSON object and nothing else. Either call a tool:
{\"action\":\"call_tool\",\"tool\":\"<tool name>\",\"input\":{...}}
or finish the research:
{\"action\":\"finish\",\"notes\":\"<summary of findings>\"}";

/// States of one research loop.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ResearchState {
    AwaitingDecision,
    ExecutingTool(ToolInvocation),
    Terminated,
    LoopLimitReached,
}

/// Transcript plus the reason research stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchOutcome {
    pub transcript: ResearchTranscript,
    pub termination: Termination,
}

/// Turns a task into a [`ResearchTranscript`] by letting the model pick tools.
pub struct ResearchAgent {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolBox>,
    max_tool_calls: usize,
    temperature: Option<f32>,
    max_tokens: u32,
}

impl ResearchAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolBox>) -> Self {
        Self {
            model,
            tools,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            temperature: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn from_config(model: Arc<dyn ChatModel>, tools: Arc<ToolBox>, config: &Config) -> Self {
        Self::new(model, tools)
            .with_max_tool_calls(config.research.max_tool_calls)
            .with_sampling(config.llm.temperature, config.llm.max_tokens)
    }

    /// Ceiling on tool calls per run; values below 1 are raised to 1.
    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls.max(1);
        self
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn max_tool_calls(&self) -> usize {
        self.max_tool_calls
    }

    pub fn role(&self) -> AgentRole {
        AgentRole::Research
    }

    /// Prompt for the next decision given the transcript so far.
    pub fn build_request(&self, task: &Task, transcript: &ResearchTranscript) -> ChatRequest {
        let mut request = ChatRequest::new(system_prompt())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .push(ChatMessage::user(task.prompt()));

        for entry in transcript.entries() {
            match entry {
                TranscriptEntry::ToolCall {
                    invocation, result, ..
                } => {
                    request = request
                        .push(ChatMessage::assistant(
                            invocation.to_directive_json().to_string(),
                        ))
                        .push(ChatMessage::user(format!(
                            "Result of {}:\n{}",
                            invocation.describe(),
                            render_result(result)
                        )));
                }
                TranscriptEntry::Rejected {
                    directive, error, ..
                } => {
                    request = request
                        .push(ChatMessage::assistant(directive.clone()))
                        .push(ChatMessage::user(format!(
                            "Error ({}): {error}\nReply with a valid directive.",
                            error.kind()
                        )));
                }
                TranscriptEntry::Note { text } => {
                    request = request
                        .push(ChatMessage::assistant(Directive::finish_json(text).to_string()));
                }
            }
        }

        request
    }

    /// Run the tool loop until the model finishes or the ceiling is reached.
    ///
    /// Tool failures land in the transcript; only a failing model call aborts.
    #[instrument(skip_all, fields(run_id = %context.run_id, role = %self.role(), model = %self.model.model_name()))]
    pub async fn run(&self, context: &AgentContext) -> Result<ResearchOutcome, ScoutError> {
        let task = &context.task;
        let observer = &context.observer;
        let mut transcript = ResearchTranscript::new();
        let mut tool_calls = 0usize;
        let mut state = ResearchState::AwaitingDecision;

        info!(max_tool_calls = self.max_tool_calls, "research started");

        let termination = loop {
            state = match state {
                ResearchState::AwaitingDecision if tool_calls >= self.max_tool_calls => {
                    ResearchState::LoopLimitReached
                }
                ResearchState::AwaitingDecision => {
                    let request = self.build_request(task, &transcript);
                    let completion = self
                        .model
                        .complete(&request)
                        .await
                        .map_err(ScoutError::Research)?;
                    if completion.truncated() {
                        warn!("research model reply was cut at the token limit");
                    }

                    let step = tool_calls + 1;
                    observer.decision(step, &completion.text);

                    match Directive::parse(&completion.text) {
                        Directive::CallTool(invocation) => ResearchState::ExecutingTool(invocation),
                        Directive::Finish { notes } => {
                            transcript.record_note(notes);
                            ResearchState::Terminated
                        }
                        Directive::Invalid { tool, error } => {
                            warn!(
                                step,
                                tool = tool.as_deref().unwrap_or("-"),
                                kind = error.kind(),
                                error = %error,
                                "rejected research directive"
                            );
                            tool_calls += 1;
                            transcript.record_rejected(step, completion.text.trim(), error);
                            ResearchState::AwaitingDecision
                        }
                    }
                }
                ResearchState::ExecutingTool(invocation) => {
                    tool_calls += 1;
                    debug!(step = tool_calls, tool = invocation.name(), "executing tool");
                    let result = self.tools.invoke(tool_calls, &invocation).await;
                    transcript.record_call(tool_calls, invocation, result);
                    ResearchState::AwaitingDecision
                }
                ResearchState::Terminated => break Termination::Completed,
                ResearchState::LoopLimitReached => {
                    break Termination::LoopLimitReached {
                        limit: self.max_tool_calls,
                    };
                }
            };
        };

        match termination {
            Termination::Completed => info!(tool_calls, "research finished"),
            Termination::LoopLimitReached { limit } => {
                warn!(tool_calls, limit, "tool-call limit reached; continuing to answer")
            }
        }
        observer.research_finished(&termination, tool_calls);

        Ok(ResearchOutcome {
            transcript,
            termination,
        })
    }
}

fn system_prompt() -> String {
    let mut prompt = String::from(RESEARCH_INSTRUCTIONS);
    prompt.push_str("\n\nAvailable tools:\n");
    for spec in tool_catalog() {
        let _ = writeln!(prompt, "- {}: {}", spec.name, spec.description);
        let _ = writeln!(prompt, "  input schema: {}", spec.parameters);
    }
    prompt.push('\n');
    prompt.push_str(REPLY_PROTOCOL);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::testing::{ScriptedChatModel, StaticPageFetcher, StaticSearchProvider, hit};
    use scout_core::tools::FileReader;
    use scout_core::Role;

    fn toolbox(search: StaticSearchProvider) -> Arc<ToolBox> {
        Arc::new(ToolBox::new(
            Arc::new(search),
            Arc::new(StaticPageFetcher::new()),
            FileReader::new(".", 1024),
        ))
    }

    #[test]
    fn system_prompt_lists_catalog_and_protocol() {
        let prompt = system_prompt();
        assert!(prompt.contains("- web_search:"));
        assert!(prompt.contains("- web_scrape:"));
        assert!(prompt.contains("- file_read:"));
        assert!(prompt.contains("\"action\":\"finish\""));
    }

    #[test]
    fn request_replays_transcript_as_turns() {
        let agent = ResearchAgent::new(
            Arc::new(ScriptedChatModel::new(Vec::<String>::new())),
            toolbox(StaticSearchProvider::new()),
        );
        let mut transcript = ResearchTranscript::new();
        transcript.record_call(
            1,
            ToolInvocation::WebSearch {
                query: "capital of France".into(),
            },
            Ok(scout_core::ToolOutput::SearchHits(vec![hit(
                "Paris",
                "https://en.wikipedia.org/wiki/Paris",
                "Paris is the capital of France.",
            )])),
        );

        let request = agent.build_request(&Task::new("What is the capital of France?"), &transcript);
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert!(request.messages[2].content.contains("\"tool\":\"web_search\""));
        assert!(request.messages[3].content.starts_with("Result of web_search(\"capital of France\")"));
        assert!(request.messages[3].content.contains("Paris is the capital of France."));
    }

    #[tokio::test]
    async fn loop_stops_at_ceiling() {
        let model = Arc::new(ScriptedChatModel::always(
            r#"{"action":"call_tool","tool":"web_search","input":{"query":"again"}}"#,
        ));
        let agent = ResearchAgent::new(model.clone(), toolbox(StaticSearchProvider::new()))
            .with_max_tool_calls(3);

        let outcome = agent
            .run(&AgentContext::detached(Task::new("loop forever")))
            .await
            .unwrap();

        assert_eq!(outcome.termination, Termination::LoopLimitReached { limit: 3 });
        assert_eq!(outcome.transcript.tool_calls(), 3);
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn invalid_directives_count_against_the_ceiling() {
        let model = Arc::new(ScriptedChatModel::always(
            r#"{"action":"call_tool","tool":"shell","input":{"cmd":"rm -rf /"}}"#,
        ));
        let agent = ResearchAgent::new(model.clone(), toolbox(StaticSearchProvider::new()))
            .with_max_tool_calls(2);

        let outcome = agent
            .run(&AgentContext::detached(Task::new("misbehave")))
            .await
            .unwrap();

        assert_eq!(outcome.termination, Termination::LoopLimitReached { limit: 2 });
        assert!(outcome
            .transcript
            .entries()
            .iter()
            .all(|entry| matches!(entry, TranscriptEntry::Rejected { .. })));
        let last_prompt = model.requests().pop().unwrap().conversation_text();
        assert!(last_prompt.contains("Error (unknown_tool): unknown tool: shell"));
    }

    #[tokio::test]
    async fn bare_answer_object_finishes_research() {
        let model = Arc::new(ScriptedChatModel::always(r#"{"answer":"Paris"}"#));
        let agent = ResearchAgent::new(model.clone(), toolbox(StaticSearchProvider::new()));

        let outcome = agent
            .run(&AgentContext::detached(Task::new("capital of France?")))
            .await
            .unwrap();

        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.transcript.tool_calls(), 0);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn model_failure_is_a_research_error() {
        let agent = ResearchAgent::new(
            Arc::new(ScriptedChatModel::failing(500, "upstream down")),
            toolbox(StaticSearchProvider::new()),
        );
        let err = agent
            .run(&AgentContext::detached(Task::new("anything")))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Research(_)));
    }

    #[tokio::test]
    async fn zero_ceiling_is_raised_to_one() {
        let agent = ResearchAgent::new(
            Arc::new(ScriptedChatModel::new(Vec::<String>::new())),
            toolbox(StaticSearchProvider::new()),
        )
        .with_max_tool_calls(0);
        assert_eq!(agent.max_tool_calls(), 1);
    }
}
