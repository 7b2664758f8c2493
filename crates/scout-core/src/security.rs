use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::ScoutError;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Require that `var` resolves to a non-empty value through `lookup`.
///
/// Callers pass `|name| std::env::var(name).ok()` for the process
/// environment, or a map lookup in tests.
pub fn require_var<F>(var: &str, lookup: F) -> Result<SecretValue, ScoutError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(SecretValue(value.trim().to_string())),
        _ => Err(ScoutError::MissingSecret(var.to_string())),
    }
}

static REDACTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
            .expect("invalid api_key regex"),
        Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)").expect("invalid secret regex"),
        Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        Regex::new(r"(sk-[A-Za-z0-9\-_]{16,})").expect("invalid sk_token regex"),
        Regex::new(r"(tvly-[A-Za-z0-9\-_]{16,})").expect("invalid tvly_token regex"),
    ]
});

/// Replace anything that looks like a credential with `[REDACTED]`.
pub fn redact_secrets(input: &str) -> String {
    let mut output = input.to_string();
    for regex in REDACTION_PATTERNS.iter() {
        output = regex
            .replace_all(&output, |caps: &Captures| {
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .into_owned();
    }
    output
}
