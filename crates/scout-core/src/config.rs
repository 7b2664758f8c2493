use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{ScoutError, SecretValue, require_var};

const DEFAULT_CONFIG_PATH: &str = "scout.toml";
const CONFIG_PATH_ENV: &str = "SCOUT_CONFIG";
const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
const MODEL_ENV: &str = "OPENAI_MODEL";

/// Runtime configuration, built once at startup and handed to every component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub tools: ToolsConfig,
    pub research: ResearchConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Apply command-line overrides. Call [`ConfigLoader::validate`] afterwards.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(model) = &overrides.model {
            self.llm.model = model.clone();
        }
        if let Some(max) = overrides.max_tool_calls {
            self.research.max_tool_calls = max;
        }
        if overrides.verbose {
            self.logging.verbose = true;
        }
        self
    }
}

/// Values the binary may force on top of file and environment settings.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub max_tool_calls: Option<usize>,
    pub verbose: bool,
}

/// Loads configuration from an optional TOML file plus environment variables.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the process environment.
    ///
    /// Resolution order for the file:
    /// 1. Explicit `path` argument (must exist).
    /// 2. `SCOUT_CONFIG` environment variable (must exist).
    /// 3. `scout.toml` in the current working directory (optional).
    pub fn load(
        path: Option<PathBuf>,
        overrides: &ConfigOverrides,
    ) -> Result<Config, ScoutError> {
        Self::load_with(path, overrides, |name| env::var(name).ok())
    }

    /// Same as [`ConfigLoader::load`] with an injectable variable source.
    pub fn load_with<F>(
        path: Option<PathBuf>,
        overrides: &ConfigOverrides,
        lookup: F,
    ) -> Result<Config, ScoutError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match resolve_path(path, &lookup) {
            Some((candidate, required)) => read_file(&candidate, required)?,
            None => Config::default(),
        };
        Self::resolve(config, overrides, lookup)
    }

    /// Parse a TOML document without touching the filesystem.
    pub fn from_toml<F>(
        raw: &str,
        overrides: &ConfigOverrides,
        lookup: F,
    ) -> Result<Config, ScoutError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config: Config = toml::from_str(raw)
            .map_err(|err| ScoutError::InvalidConfiguration(err.to_string()))?;
        Self::resolve(config, overrides, lookup)
    }

    fn resolve<F>(
        mut config: Config,
        overrides: &ConfigOverrides,
        lookup: F,
    ) -> Result<Config, ScoutError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.llm.base_url = base_url.trim().to_string();
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            config.llm.model = model.trim().to_string();
        }

        config = config.with_overrides(overrides);
        Self::validate(&config)?;

        config.llm.api_key = require_var(&config.llm.api_key_env, &lookup)?;
        config.search.api_key = require_var(&config.search.api_key_env, &lookup).ok();

        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ScoutError> {
        if config.llm.api_key_env.trim().is_empty() {
            return Err(ScoutError::InvalidConfiguration(
                "llm.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.llm.model.trim().is_empty() {
            return Err(ScoutError::InvalidConfiguration(
                "llm.model must not be empty".into(),
            ));
        }
        if config.research.max_tool_calls == 0 {
            return Err(ScoutError::InvalidConfiguration(
                "research.max_tool_calls must be at least 1".into(),
            ));
        }
        if config.tools.scrape_max_chars == 0 || config.tools.file_max_bytes == 0 {
            return Err(ScoutError::InvalidConfiguration(
                "tool limits must be positive".into(),
            ));
        }
        if config.tools.timeout_secs == 0 || config.llm.timeout_secs == 0 {
            return Err(ScoutError::InvalidConfiguration(
                "timeouts must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_path<F>(path: Option<PathBuf>, lookup: &F) -> Option<(PathBuf, bool)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = path {
        return Some((path, true));
    }

    if let Some(from_env) = lookup(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return Some((PathBuf::from(from_env.trim()), true));
        }
    }

    let default = Path::new(DEFAULT_CONFIG_PATH);
    default.exists().then(|| (default.to_path_buf(), false))
}

fn read_file(path: &Path, required: bool) -> Result<Config, ScoutError> {
    match fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw).map_err(|err| {
            ScoutError::InvalidConfiguration(format!("{}: {err}", path.display()))
        }),
        Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
            Ok(Config::default())
        }
        Err(err) => Err(ScoutError::config_io(path.to_path_buf(), err)),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Model used by the answer agent; falls back to `model`.
    pub answer_model: Option<String>,
    pub api_key_env: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: SecretValue,
}

impl LlmConfig {
    pub fn answer_model(&self) -> &str {
        self.answer_model.as_deref().unwrap_or(&self.model)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            answer_model: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: None,
            max_tokens: 4096,
            timeout_secs: 120,
            api_key: SecretValue::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub max_results: usize,
    #[serde(skip)]
    pub api_key: Option<SecretValue>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key_env: "TAVILY_API_KEY".to_string(),
            max_results: 5,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub timeout_secs: u64,
    pub scrape_max_chars: usize,
    pub file_max_bytes: u64,
    pub file_root: PathBuf,
    pub user_agent: String,
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            scrape_max_chars: 15_000,
            file_max_bytes: 1024 * 1024,
            file_root: PathBuf::from("."),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub max_tool_calls: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self { max_tool_calls: 10 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    /// Explicit `EnvFilter` directive; `RUST_LOG` still wins when set.
    pub filter: Option<String>,
}
