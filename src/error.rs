use reqwest::StatusCode;

/// Non-success HTTP response from the video service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("login required")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("request failed: {0}")]
    Network(String),
}

impl FeedError {
    pub fn from_api(err: &anyhow::Error) -> Self {
        let status = err.chain().find_map(|cause| match cause.downcast_ref::<ApiError>() {
            Some(ApiError::Status { status, message }) => Some((*status, message.clone())),
            None => None,
        });
        match status {
            Some((StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _)) => FeedError::Unauthorized,
            Some((StatusCode::NOT_FOUND, message)) => FeedError::NotFound(message),
            Some((
                StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY,
                message,
            )) => FeedError::Validation(message),
            _ => FeedError::Network(format!("{err:#}")),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Network(_))
    }
}
