//! Image URL extraction from loosely shaped generation responses.
//!
//! The remote service does not commit to one response schema, so extraction
//! walks a fixed list of strategies and takes the first hit.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static IMAGE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\S+\.(?:jpg|jpeg|png|webp)").expect("valid image url regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The whole response is a URL string.
    BareUrl,
    /// An image link inside `choices[0].message.content`.
    ChatCompletionContent,
    /// `data[0].url`
    DataUrl,
    /// `images[0]`
    ImagesArray,
}

impl ExtractionStrategy {
    /// Priority order; earlier strategies win.
    pub const ORDERED: [ExtractionStrategy; 4] = [
        ExtractionStrategy::BareUrl,
        ExtractionStrategy::ChatCompletionContent,
        ExtractionStrategy::DataUrl,
        ExtractionStrategy::ImagesArray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExtractionStrategy::BareUrl => "bare_url",
            ExtractionStrategy::ChatCompletionContent => "chat_completion_content",
            ExtractionStrategy::DataUrl => "data_url",
            ExtractionStrategy::ImagesArray => "images_array",
        }
    }

    pub fn apply(self, response: &Value) -> Option<String> {
        match self {
            ExtractionStrategy::BareUrl => response
                .as_str()
                .filter(|text| text.starts_with("http"))
                .map(str::to_string),
            ExtractionStrategy::ChatCompletionContent => response
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .and_then(|content| IMAGE_URL_RE.find(content))
                .map(|found| found.as_str().to_string()),
            ExtractionStrategy::DataUrl => non_empty_str(response.pointer("/data/0/url")),
            ExtractionStrategy::ImagesArray => non_empty_str(response.pointer("/images/0")),
        }
    }
}

pub fn extract_image_url(response: &Value) -> Option<String> {
    extract_with_strategy(response).map(|(url, _)| url)
}

/// Like [`extract_image_url`], also reporting which strategy matched.
pub fn extract_with_strategy(response: &Value) -> Option<(String, ExtractionStrategy)> {
    ExtractionStrategy::ORDERED
        .into_iter()
        .find_map(|strategy| strategy.apply(response).map(|url| (url, strategy)))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
