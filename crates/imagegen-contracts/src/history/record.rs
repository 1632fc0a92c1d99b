use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::{GenerationRequest, GenerationResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageRecord {
    pub id: String,
    pub url: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl GeneratedImageRecord {
    /// Builds the record for an accepted result. Returns `None` for failures.
    pub fn from_result(request: &GenerationRequest, result: &GenerationResult) -> Option<Self> {
        let GenerationResult::Success {
            image_url,
            metadata,
        } = result
        else {
            return None;
        };
        Some(Self {
            id: new_record_id(),
            url: image_url.clone(),
            prompt: metadata.prompt.clone(),
            style: request.style.clone(),
            aspect_ratio: Some(request.aspect_ratio.as_str().to_string()),
            created_at: Utc::now(),
            download_url: Some(image_url.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCollection {
    pub images: Vec<GeneratedImageRecord>,
    #[serde(
        default,
        alias = "lastGenerated",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_generated_at: Option<DateTime<Utc>>,
}

impl HistoryCollection {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&GeneratedImageRecord> {
        self.images.iter().find(|image| image.id == id)
    }
}

/// `img_<unix millis>_<9 random chars>`.
pub fn new_record_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("img_{}_{}", Utc::now().timestamp_millis(), &random[..9])
}
