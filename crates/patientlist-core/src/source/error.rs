use reqwest::StatusCode;
use thiserror::Error;

/// Why a patient source could not produce records
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Patient API rejected the credentials (401); check PATIENTLIST_TOKEN")]
    Unauthorized,

    #[error("Not permitted to read patient records (403): {0}")]
    Forbidden(String),

    #[error("Patient endpoint not found (404): {0}")]
    EndpointNotFound(String),

    #[error("Patient API still rate limiting after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Patient API server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("Unexpected status {status} from patient API: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Could not reach patient API: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed patient payload: {0}")]
    MalformedPayload(String),

    #[error("No cached patient list available")]
    CacheMiss,
}

/// Response bodies are cut to this many characters in error messages
const MAX_BODY_CHARS: usize = 500;

impl SourceError {
    fn excerpt(body: &str) -> String {
        let body = body.trim();
        match body.char_indices().nth(MAX_BODY_CHARS) {
            None => body.to_string(),
            Some((cut, _)) => format!("{}... ({} more bytes)", &body[..cut], body.len() - cut),
        }
    }

    /// Map a non-success, non-429 response from the patient endpoint.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = Self::excerpt(body);
        match status {
            StatusCode::UNAUTHORIZED => SourceError::Unauthorized,
            StatusCode::FORBIDDEN => SourceError::Forbidden(body),
            StatusCode::NOT_FOUND => SourceError::EndpointNotFound(body),
            s if s.is_server_error() => SourceError::ServerError { status: s.as_u16(), body },
            s => SourceError::UnexpectedStatus { status: s.as_u16(), body },
        }
    }
}
