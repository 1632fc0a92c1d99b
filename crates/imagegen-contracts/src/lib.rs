//! Pure building blocks of the image generation pipeline: request types,
//! prompt validation and composition, response extraction and the local
//! generation history.

pub mod events;
pub mod extract;
pub mod history;
pub mod prompts;
pub mod request;
pub mod styles;

pub use extract::{extract_image_url, extract_with_strategy, ExtractionStrategy};
pub use history::{GeneratedImageRecord, HistoryCollection, HistoryStore};
pub use prompts::{check_prompt, compose, validate, PromptValidation, ValidationError};
pub use request::{AspectRatio, GenerationMetadata, GenerationRequest, GenerationResult, Quality};
