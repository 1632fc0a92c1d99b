mod composer;
mod validator;

pub use composer::{compose, compose_with, HIGH_QUALITY_MODIFIER, ULTRA_QUALITY_MODIFIER};
pub use validator::{
    check_prompt, validate, PromptValidation, ValidationError, MAX_PROMPT_CHARS, POLICY_TERMS,
};
