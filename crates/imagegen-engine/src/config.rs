use std::env;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://oi-server.onrender.com/chat/completions";
pub const DEFAULT_MODEL: &str = "replicate/black-forest-labs/flux-1.1-pro";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub customer_id: Option<String>,
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            customer_id: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GeneratorConfig {
    /// Reads `IMAGEGEN_*` variables, falling back to defaults for anything unset or blank.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            endpoint: get("IMAGEGEN_ENDPOINT")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint),
            model: get("IMAGEGEN_MODEL").unwrap_or(defaults.model),
            api_key: get("IMAGEGEN_API_KEY"),
            customer_id: get("IMAGEGEN_CUSTOMER_ID"),
            timeout: get("IMAGEGEN_TIMEOUT_SECS")
                .and_then(|value| value.parse::<u64>().ok())
                .map(timeout_from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Clamps a user-supplied timeout into the supported range.
pub fn timeout_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
}
