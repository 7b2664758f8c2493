//! Scout agents: the research tool loop, answer synthesis and the pipeline
//! that runs them in sequence.

pub mod agent_context;
pub mod answer;
pub mod directive;
pub mod pipeline;
pub mod research;

pub use agent_context::{AgentContext, AgentRole};
pub use answer::{AnswerAgent, NO_RESEARCH_PLACEHOLDER, UNAVAILABLE_ANSWER, answer_input};
pub use directive::{Directive, extract_json};
pub use pipeline::{Pipeline, RunReport};
pub use research::{ResearchAgent, ResearchOutcome};
