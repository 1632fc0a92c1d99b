use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Prompts longer than this (in characters) are rejected.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Disallowed terms per policy category. Matched as whole words, ignoring case.
/// Word boundaries are ASCII-only, so an accented letter does not join a word.
///
/// This is a coarse keyword screen, not a content-safety guarantee.
pub const POLICY_TERMS: &[(&str, &[&str])] = &[
    ("sexual", &["nude", "naked", "nsfw", "explicit", "sexual"]),
    ("violence", &["violence", "blood", "gore", "death", "kill"]),
    ("hate", &["hate", "racism", "discrimination"]),
];

static POLICY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    POLICY_TERMS
        .iter()
        .map(|(category, terms)| {
            let pattern = format!(r"(?i)(?-u:\b)(?:{})(?-u:\b)", terms.join("|"));
            (*category, Regex::new(&pattern).expect("valid policy regex"))
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Prompt cannot be empty")]
    EmptyPrompt,
    #[error("Prompt must be less than {max} characters")]
    TooLong { len: usize, max: usize },
    #[error("Prompt contains inappropriate content")]
    PolicyViolation { category: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ValidationError>,
}

impl From<Result<(), ValidationError>> for PromptValidation {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                reason: None,
            },
            Err(reason) => Self {
                valid: false,
                reason: Some(reason),
            },
        }
    }
}

pub fn validate(prompt: &str) -> PromptValidation {
    check_prompt(prompt).into()
}

pub fn check_prompt(prompt: &str) -> Result<(), ValidationError> {
    if prompt.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    let len = prompt.chars().count();
    if len > MAX_PROMPT_CHARS {
        return Err(ValidationError::TooLong {
            len,
            max: MAX_PROMPT_CHARS,
        });
    }
    if let Some(category) = policy_category(prompt) {
        return Err(ValidationError::PolicyViolation { category });
    }
    Ok(())
}

fn policy_category(prompt: &str) -> Option<&'static str> {
    POLICY_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(prompt))
        .map(|(category, _)| *category)
}
