//! Tool layer: web search, page scraping and local file reading.
//!
//! Each tool is an async function of its arguments returning a
//! [`ToolResult`]. Failures are values, never panics. [`ToolBox`] bundles the
//! three tools with their collaborators and reports every invocation to a
//! [`RunObserver`].

mod file;
mod scrape;
mod search;

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{Config, NoopObserver, RunObserver, ScoutError, ToolError};

pub use file::FileReader;
pub use scrape::{FetchedPage, HttpFetcher, PageFetcher, extract_text};
pub use search::{SearchHit, SearchProvider, TavilySearch, UnconfiguredSearch};

pub const WEB_SEARCH: &str = "web_search";
pub const WEB_SCRAPE: &str = "web_scrape";
pub const FILE_READ: &str = "file_read";

/// A request to the tool layer, as chosen by the research model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "input", rename_all = "snake_case")]
pub enum ToolInvocation {
    WebSearch {
        query: String,
    },
    WebScrape {
        url: String,
    },
    FileRead {
        #[serde(alias = "filename", alias = "file_path")]
        path: String,
    },
}

impl ToolInvocation {
    /// Build an invocation from a tool name and the model-supplied input.
    ///
    /// A bare string input is accepted as the tool's single argument.
    pub fn from_parts(tool: &str, input: Value) -> Result<Self, ToolError> {
        let tool = tool.trim();
        let param = match tool {
            WEB_SEARCH => "query",
            WEB_SCRAPE => "url",
            FILE_READ => "path",
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };

        let input = match input {
            Value::String(text) => json!({ param: text }),
            Value::Null => json!({}),
            other => other,
        };

        let invocation: ToolInvocation =
            serde_json::from_value(json!({ "tool": tool, "input": input }))
                .map_err(|err| ToolError::InvalidArguments(format!("{tool}: {err}")))?;

        if invocation.argument().trim().is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "{tool}: `{param}` must not be empty"
            )));
        }
        Ok(invocation.trimmed())
    }

    fn trimmed(self) -> Self {
        match self {
            ToolInvocation::WebSearch { query } => ToolInvocation::WebSearch {
                query: query.trim().to_string(),
            },
            ToolInvocation::WebScrape { url } => ToolInvocation::WebScrape {
                url: url.trim().to_string(),
            },
            ToolInvocation::FileRead { path } => ToolInvocation::FileRead {
                path: path.trim().to_string(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolInvocation::WebSearch { .. } => WEB_SEARCH,
            ToolInvocation::WebScrape { .. } => WEB_SCRAPE,
            ToolInvocation::FileRead { .. } => FILE_READ,
        }
    }

    pub fn argument(&self) -> &str {
        match self {
            ToolInvocation::WebSearch { query } => query,
            ToolInvocation::WebScrape { url } => url,
            ToolInvocation::FileRead { path } => path,
        }
    }

    /// Call-style rendering, e.g. `web_search("capital of France")`.
    pub fn describe(&self) -> String {
        format!("{}({:?})", self.name(), self.argument())
    }

    /// Directive JSON the research model would emit for this call.
    pub fn to_directive_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("action".into(), json!("call_tool"));
        }
        value
    }
}

/// Successful tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    SearchHits(Vec<SearchHit>),
    Text(String),
}

impl ToolOutput {
    pub fn render(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::SearchHits(hits) if hits.is_empty() => "No results found.".to_string(),
            ToolOutput::SearchHits(hits) => {
                let mut out = String::new();
                for (idx, hit) in hits.iter().enumerate() {
                    let _ = writeln!(out, "{}. {}", idx + 1, hit.title);
                    let _ = writeln!(out, "   URL: {}", hit.url);
                    if !hit.snippet.is_empty() {
                        let _ = writeln!(out, "   {}", hit.snippet);
                    }
                }
                out.trim_end().to_string()
            }
        }
    }
}

pub type ToolResult = Result<ToolOutput, ToolError>;

/// Text form of a tool result as shown to the model.
pub fn render_result(result: &ToolResult) -> String {
    match result {
        Ok(output) => output.render(),
        Err(err) => format!("Error ({}): {err}", err.kind()),
    }
}

/// Name, description and parameter schema of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Every tool the research agent may call.
pub fn tool_catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: WEB_SEARCH,
            description: "Search the web and return titles, URLs and snippets of the top results.",
            parameters: string_schema("query", "Search query"),
        },
        ToolSpec {
            name: WEB_SCRAPE,
            description: "Fetch a web page and return its readable text (truncated).",
            parameters: string_schema("url", "Absolute http(s) URL to fetch"),
        },
        ToolSpec {
            name: FILE_READ,
            description: "Read a local text file relative to the working directory.",
            parameters: string_schema("path", "Path of the file to read"),
        },
    ]
}

fn string_schema(name: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": { name: { "type": "string", "description": description } },
        "required": [name],
    })
}

/// The tool layer with its collaborators and limits.
pub struct ToolBox {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    files: FileReader,
    search_max_results: usize,
    scrape_max_chars: usize,
    observer: Arc<dyn RunObserver>,
}

impl ToolBox {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        files: FileReader,
    ) -> Self {
        let defaults = crate::ToolsConfig::default();
        Self {
            search,
            fetcher,
            files,
            search_max_results: crate::SearchConfig::default().max_results,
            scrape_max_chars: defaults.scrape_max_chars,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Production tool set: Tavily search (if keyed), HTTP fetcher, file reader.
    pub fn from_config(config: &Config) -> Result<Self, ScoutError> {
        let search: Arc<dyn SearchProvider> = match &config.search.api_key {
            Some(key) => Arc::new(TavilySearch::new(
                key.clone(),
                &config.search.base_url,
                config.tools.timeout(),
            )?),
            None => {
                tracing::warn!(
                    env = %config.search.api_key_env,
                    "no search credential configured; web_search will report errors"
                );
                Arc::new(UnconfiguredSearch::new(&config.search.api_key_env))
            }
        };
        let fetcher = Arc::new(HttpFetcher::new(
            config.tools.timeout(),
            &config.tools.user_agent,
        )?);
        let files = FileReader::new(&config.tools.file_root, config.tools.file_max_bytes);

        Ok(Self::new(search, fetcher, files)
            .with_limits(config.search.max_results, config.tools.scrape_max_chars))
    }

    pub fn with_limits(mut self, search_max_results: usize, scrape_max_chars: usize) -> Self {
        self.search_max_results = search_max_results.max(1);
        self.scrape_max_chars = scrape_max_chars.max(1);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn web_search(&self, query: &str) -> ToolResult {
        debug!(
            provider = self.search.name(),
            max_results = self.search_max_results,
            "searching"
        );
        self.search
            .search(query, self.search_max_results)
            .await
            .map(ToolOutput::SearchHits)
    }

    pub async fn web_scrape(&self, url: &str) -> ToolResult {
        scrape::web_scrape(self.fetcher.as_ref(), url, self.scrape_max_chars)
            .await
            .map(ToolOutput::Text)
    }

    pub async fn file_read(&self, path: &str) -> ToolResult {
        self.files.read(path).await.map(ToolOutput::Text)
    }

    /// Run one invocation, notifying the observer before and after.
    pub async fn invoke(&self, step: usize, invocation: &ToolInvocation) -> ToolResult {
        self.observer.tool_started(step, invocation);
        let started = Instant::now();

        let result = match invocation {
            ToolInvocation::WebSearch { query } => self.web_search(query).await,
            ToolInvocation::WebScrape { url } => self.web_scrape(url).await,
            ToolInvocation::FileRead { path } => self.file_read(path).await,
        };

        self.observer
            .tool_finished(step, invocation, &result, started.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_accepts_object_and_bare_string() {
        let inv =
            ToolInvocation::from_parts("web_search", json!({"query": " capital of France "}))
                .unwrap();
        assert_eq!(
            inv,
            ToolInvocation::WebSearch {
                query: "capital of France".into()
            }
        );

        let inv = ToolInvocation::from_parts("web_scrape", json!("https://example.com")).unwrap();
        assert_eq!(inv.argument(), "https://example.com");
    }

    #[test]
    fn from_parts_accepts_filename_alias() {
        let inv = ToolInvocation::from_parts("file_read", json!({"filename": "notes.txt"})).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::FileRead {
                path: "notes.txt".into()
            }
        );
    }

    #[test]
    fn from_parts_rejects_unknown_tools_and_bad_arguments() {
        let err = ToolInvocation::from_parts("code_interpreter", json!({})).unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("code_interpreter".into()));

        let err = ToolInvocation::from_parts("web_search", json!({"q": "x"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = ToolInvocation::from_parts("file_read", json!({"path": "  "})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn directive_json_round_trips() {
        let inv = ToolInvocation::WebSearch {
            query: "capital of France".into(),
        };
        let value = inv.to_directive_json();
        assert_eq!(value["action"], "call_tool");
        assert_eq!(value["tool"], "web_search");
        assert_eq!(value["input"]["query"], "capital of France");
        assert_eq!(inv.describe(), "web_search(\"capital of France\")");
    }

    #[test]
    fn results_render_for_the_model() {
        let hits = ToolOutput::SearchHits(vec![SearchHit {
            title: "Paris - Wikipedia".into(),
            url: "https://en.wikipedia.org/wiki/Paris".into(),
            snippet: "Paris is the capital of France.".into(),
        }]);
        let text = hits.render();
        assert!(text.starts_with("1. Paris - Wikipedia"));
        assert!(text.contains("URL: https://en.wikipedia.org/wiki/Paris"));

        assert_eq!(ToolOutput::SearchHits(vec![]).render(), "No results found.");

        let err: ToolResult = Err(ToolError::Fetch("connection refused".into()));
        assert_eq!(
            render_result(&err),
            "Error (fetch_error): fetch failed: connection refused"
        );
    }

    #[test]
    fn catalog_lists_three_tools() {
        let names: Vec<_> = tool_catalog().iter().map(|spec| spec.name).collect();
        assert_eq!(names, vec![WEB_SEARCH, WEB_SCRAPE, FILE_READ]);
    }
}
