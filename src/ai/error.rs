use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier transport failed (status {status:?}): {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
    #[error("classification unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },
    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),
    #[error("no API token configured")]
    MissingCredential,
    #[error("invalid classification input: {0}")]
    InvalidInput(String),
}

impl ClassifyError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        ClassifyError::Unavailable {
            attempts: 0,
            reason: reason.into(),
        }
    }

    /// Only transport failures are transient; everything else is a terminal
    /// answer for the request that produced it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClassifyError::Transport { .. })
    }
}

impl From<reqwest::Error> for ClassifyError {
    fn from(err: reqwest::Error) -> Self {
        ClassifyError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
