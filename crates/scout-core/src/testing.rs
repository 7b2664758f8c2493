//! Deterministic doubles for the model and web boundaries.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream crates' tests. Nothing here touches the network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::tools::{FetchedPage, PageFetcher, SearchHit, SearchProvider, ToolInvocation, ToolResult};
use crate::{ChatModel, ChatRequest, Completion, LlmError, RunObserver, Termination, ToolError};

enum Scripted {
    Reply(String),
    Fail { status: u16, body: String },
}

/// Chat model that replays a fixed script of completions and records every prompt.
///
/// Once the script is exhausted the last reply is repeated if `repeat_last`
/// is set; otherwise an `InvalidResponse` error is returned.
pub struct ScriptedChatModel {
    name: String,
    script: Mutex<VecDeque<Scripted>>,
    last: Mutex<Option<String>>,
    repeat_last: bool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "scripted".to_string(),
            script: Mutex::new(
                replies
                    .into_iter()
                    .map(|reply| Scripted::Reply(reply.into()))
                    .collect(),
            ),
            last: Mutex::new(None),
            repeat_last: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model that answers every prompt with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        let reply: String = reply.into();
        Self::new([reply]).repeating()
    }

    /// A model whose first call fails with a provider error.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        let model = Self::new(Vec::<String>::new());
        model.push_failure(status, body);
        model
    }

    pub fn repeating(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock_script().push_back(Scripted::Reply(reply.into()));
    }

    pub fn push_failure(&self, status: u16, body: impl Into<String>) {
        self.lock_script().push_back(Scripted::Fail {
            status,
            body: body.into(),
        });
    }

    /// Every prompt seen so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Scripted>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self.lock_script().pop_front();
        let text = match next {
            Some(Scripted::Reply(text)) => text,
            Some(Scripted::Fail { status, body }) => {
                return Err(LlmError::Provider { status, body });
            }
            None => {
                let last = self
                    .last
                    .lock()
                    .ok()
                    .and_then(|guard| guard.clone())
                    .filter(|_| self.repeat_last);
                match last {
                    Some(text) => text,
                    None => {
                        return Err(LlmError::InvalidResponse("script exhausted".into()));
                    }
                }
            }
        };

        if let Ok(mut last) = self.last.lock() {
            *last = Some(text.clone());
        }
        Ok(Completion {
            text,
            finish_reason: Some("stop".into()),
        })
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Search provider backed by a query → hits table.
///
/// Unknown queries return no hits; queries registered with
/// [`StaticSearchProvider::fail`] return the given error.
#[derive(Default)]
pub struct StaticSearchProvider {
    hits: HashMap<String, Vec<SearchHit>>,
    failures: HashMap<String, ToolError>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub fn fail(mut self, query: &str, error: ToolError) -> Self {
        self.failures.insert(query.to_string(), error);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        if let Some(error) = self.failures.get(query) {
            return Err(error.clone());
        }
        Ok(self
            .hits
            .get(query)
            .map(|hits| hits.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Page fetcher backed by a URL → HTML table. Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct StaticPageFetcher {
    pages: HashMap<String, String>,
}

impl StaticPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ToolError> {
        let key = url.trim_end_matches('/');
        let body = self
            .pages
            .get(url)
            .or_else(|| self.pages.get(key))
            .ok_or_else(|| ToolError::Fetch(format!("{url}: connection failed")))?;
        Ok(FetchedPage {
            url: url.to_string(),
            content_type: Some("text/html".into()),
            body: body.clone(),
        })
    }
}

/// One recorded observer notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    ToolStarted { step: usize, call: String },
    ToolFinished { step: usize, call: String, ok: bool },
    Decision { step: usize },
    ResearchFinished { termination: Termination, tool_calls: usize },
    Answer(String),
}

/// Observer that keeps every notification for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<Observed> {
        self.seen
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn record(&self, observed: Observed) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(observed);
        }
    }
}

impl RunObserver for RecordingObserver {
    fn tool_started(&self, step: usize, invocation: &ToolInvocation) {
        self.record(Observed::ToolStarted {
            step,
            call: invocation.describe(),
        });
    }

    fn tool_finished(
        &self,
        step: usize,
        invocation: &ToolInvocation,
        result: &ToolResult,
        _elapsed: Duration,
    ) {
        self.record(Observed::ToolFinished {
            step,
            call: invocation.describe(),
            ok: result.is_ok(),
        });
    }

    fn decision(&self, step: usize, _raw: &str) {
        self.record(Observed::Decision { step });
    }

    fn research_finished(&self, termination: &Termination, tool_calls: usize) {
        self.record(Observed::ResearchFinished {
            termination: *termination,
            tool_calls,
        });
    }

    fn answer_ready(&self, answer: &str) {
        self.record(Observed::Answer(answer.to_string()));
    }
}

/// Search hit shorthand for tests.
pub fn hit(title: &str, url: &str, snippet: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        snippet: snippet.to_string(),
    }
}
