//! Operation status reported back to a session.

/// Details used when no status arrived in time.
pub const TIMEOUT_DETAILS: &str = "operation timeout hit";

/// Outcome code of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Success = 200,
    Error = 500,
    Timeout = 600,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Error and Timeout both count as failures on the wire.
    pub fn is_failure(self) -> bool {
        self.as_u16() >= StatusCode::Error.as_u16()
    }
}

/// Outcome of one command, consumed once by the originating session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub details: String,
}

impl Status {
    pub fn new(code: StatusCode, details: impl Into<String>) -> Self {
        Self {
            code,
            details: details.into(),
        }
    }

    pub fn success(details: impl Into<String>) -> Self {
        Self::new(StatusCode::Success, details)
    }

    pub fn error(details: impl Into<String>) -> Self {
        Self::new(StatusCode::Error, details)
    }

    pub fn timeout() -> Self {
        Self::new(StatusCode::Timeout, TIMEOUT_DETAILS)
    }

    pub fn is_failure(&self) -> bool {
        self.code.is_failure()
    }
}
