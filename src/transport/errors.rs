use std::fmt;

/// Categories of transport failures for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The network call itself failed (DNS, TLS, refused). Never retried
    /// here; retry policy belongs to the caller.
    Connection,
    /// Non-success HTTP status.
    HttpStatus,
    /// Success status but no readable body.
    EmptyBody,
    /// Failure while iterating an already-open stream.
    Read,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Connection => write!(f, "connection"),
            TransportErrorKind::HttpStatus => write!(f, "http_status"),
            TransportErrorKind::EmptyBody => write!(f, "empty_body"),
            TransportErrorKind::Read => write!(f, "read"),
        }
    }
}

/// Structured transport error with kind and a display-ready message.
#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a connection error from a failed request.
    pub fn connection(err: &reqwest::Error) -> Self {
        Self::new(
            TransportErrorKind::Connection,
            format!("Request failed: {err}"),
        )
    }

    /// Creates an HTTP status error.
    ///
    /// The response body is the diagnostic of record when present; otherwise
    /// a generic status message stands in.
    pub fn http_status(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let message = if trimmed.is_empty() {
            format!("HTTP {status}")
        } else {
            trimmed.to_string()
        };
        Self::new(TransportErrorKind::HttpStatus, message)
    }

    /// Creates an empty-body error.
    pub fn empty_body() -> Self {
        Self::new(TransportErrorKind::EmptyBody, "Response body is empty")
    }

    /// Creates a read error from a mid-stream failure.
    pub fn read(err: impl fmt::Display) -> Self {
        Self::new(
            TransportErrorKind::Read,
            format!("Failed to read response stream: {err}"),
        )
    }
}

// Display prints only the message: it is what ends up on the assistant
// entry when a turn fails, so it must read as user-facing text.
impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

pub type TransportResult<T> = Result<T, TransportError>;
