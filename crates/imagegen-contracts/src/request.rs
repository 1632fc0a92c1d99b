use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    TallPortrait,
    #[serde(rename = "3:2")]
    Landscape,
    #[serde(rename = "2:3")]
    Portrait,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    Vertical,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 7] = [
        AspectRatio::Square,
        AspectRatio::Widescreen,
        AspectRatio::TallPortrait,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Standard,
        AspectRatio::Vertical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::TallPortrait => "9:16",
            AspectRatio::Landscape => "3:2",
            AspectRatio::Portrait => "2:3",
            AspectRatio::Standard => "4:3",
            AspectRatio::Vertical => "3:4",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Square => "Square (1:1)",
            AspectRatio::Widescreen => "Landscape (16:9)",
            AspectRatio::TallPortrait => "Portrait (9:16)",
            AspectRatio::Landscape => "Photo (3:2)",
            AspectRatio::Portrait => "Portrait Photo (2:3)",
            AspectRatio::Standard => "Standard (4:3)",
            AspectRatio::Vertical => "Vertical (3:4)",
        }
    }

    /// Phrase appended to the composed prompt. The square default has none.
    pub fn layout_hint(self) -> Option<&'static str> {
        match self {
            AspectRatio::Square => None,
            AspectRatio::Widescreen => Some("wide landscape format"),
            AspectRatio::TallPortrait => Some("tall portrait format"),
            AspectRatio::Landscape => Some("landscape format"),
            AspectRatio::Portrait => Some("portrait format"),
            AspectRatio::Standard => Some("standard format"),
            AspectRatio::Vertical => Some("vertical format"),
        }
    }

    /// Nominal output size in pixels as `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Widescreen => (1920, 1080),
            AspectRatio::TallPortrait => (1080, 1920),
            AspectRatio::Landscape => (1536, 1024),
            AspectRatio::Portrait => (1024, 1536),
            AspectRatio::Standard => (1280, 960),
            AspectRatio::Vertical => (960, 1280),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ParseEnumError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == trimmed)
            .ok_or_else(|| ParseEnumError {
                kind: "aspect ratio",
                value: trimmed.to_string(),
                expected: AspectRatio::ALL
                    .iter()
                    .map(|ratio| ratio.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Standard,
    High,
    Ultra,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Standard => "standard",
            Quality::High => "high",
            Quality::Ultra => "ultra",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = ParseEnumError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Quality::Standard),
            "high" => Ok(Quality::High),
            "ultra" => Ok(Quality::Ultra),
            other => Err(ParseEnumError {
                kind: "quality",
                value: other.to_string(),
                expected: "standard, high, ultra".to_string(),
            }),
        }
    }
}

/// One user submission. Built fresh for every generate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub quality: Quality,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: None,
            aspect_ratio: AspectRatio::default(),
            quality: Quality::default(),
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub model: String,
    /// Capture time of the result.
    pub processing_time: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// The prompt as submitted, before composition.
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GenerationResult {
    #[serde(rename_all = "camelCase")]
    Success {
        image_url: String,
        metadata: GenerationMetadata,
    },
    Failure {
        error: String,
    },
}

impl GenerationResult {
    pub fn failure(error: impl Into<String>) -> Self {
        GenerationResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success { .. })
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            GenerationResult::Success { image_url, .. } => Some(image_url.as_str()),
            GenerationResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            GenerationResult::Success { .. } => None,
            GenerationResult::Failure { error } => Some(error.as_str()),
        }
    }
}
