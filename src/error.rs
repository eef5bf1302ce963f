use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failures talking to the backend. Everything else in the crate is `anyhow`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session expired. Run 'elevate login' again.")]
    Unauthorized,

    #[error("Validation failed: {detail}")]
    Validation { detail: String },

    #[error("Request failed with status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_detail(body);
        match status {
            401 => ApiError::Unauthorized,
            400 | 422 => ApiError::Validation { detail },
            _ => ApiError::Status { status, detail },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Inline message for a form banner. Only validation details from the
    /// backend are shown verbatim.
    pub fn banner(&self) -> String {
        match self {
            ApiError::Validation { detail } if !detail.is_empty() => detail.clone(),
            ApiError::Status { detail, .. } if !detail.is_empty() => detail.clone(),
            ApiError::Unauthorized => self.to_string(),
            _ => "Request failed. Please try again.".to_string(),
        }
    }
}

/// Pulls the `detail` field out of an error body. FastAPI sends either a
/// string or a list of `{loc, msg}` objects.
pub fn extract_detail(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    match json.get("detail") {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
