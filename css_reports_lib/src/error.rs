//! Error types for the library layer.

use std::fmt;

/// Errors produced while validating and running a report request,
/// wrapping upstream portal errors and adding validation and local
/// storage failures.
#[derive(Debug)]
pub enum ReportError {
    /// An error from the portal client.
    Portal(guild_portal::Error),
    /// The report request was malformed.
    InvalidInput(String),
    /// Writing or reading the temporary report file failed.
    Storage(std::io::Error),
}

/// Caller-facing classification of a [`ReportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Transport,
    ReportRender,
    NoData,
    ExportUrlNotFound,
    Validation,
    Storage,
}

/// Terminal failure states of a report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureState {
    AuthFailed,
    PortalRejected,
    NoData,
    ExportNotFound,
    TransportFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "AuthenticationError",
            Self::Transport => "TransportError",
            Self::ReportRender => "ReportRenderError",
            Self::NoData => "NoDataError",
            Self::ExportUrlNotFound => "ExportUrlNotFoundError",
            Self::Validation => "ValidationError",
            Self::Storage => "StorageError",
        }
    }

    /// The pipeline state this error ends in. Validation failures happen
    /// before the pipeline starts and have none.
    pub fn terminal_state(&self) -> Option<FailureState> {
        match self {
            Self::Authentication => Some(FailureState::AuthFailed),
            Self::Transport | Self::Storage => Some(FailureState::TransportFailed),
            Self::ReportRender => Some(FailureState::PortalRejected),
            Self::NoData => Some(FailureState::NoData),
            Self::ExportUrlNotFound => Some(FailureState::ExportNotFound),
            Self::Validation => None,
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Portal(e) => match e {
                guild_portal::Error::Authentication { .. } => ErrorKind::Authentication,
                guild_portal::Error::Network(_)
                | guild_portal::Error::HttpStatus { .. }
                | guild_portal::Error::InvalidUrl(_) => ErrorKind::Transport,
                guild_portal::Error::ReportRender | guild_portal::Error::Parse(_) => {
                    ErrorKind::ReportRender
                }
                guild_portal::Error::NoData => ErrorKind::NoData,
                guild_portal::Error::ExportUrlNotFound => ErrorKind::ExportUrlNotFound,
            },
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Portal(e) => write!(f, "Portal error: {}", e),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Portal(e) => Some(e),
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<guild_portal::Error> for ReportError {
    fn from(e: guild_portal::Error) -> Self {
        Self::Portal(e)
    }
}

impl From<std::io::Error> for ReportError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_errors_map_to_kinds() {
        let cases = [
            (
                guild_portal::Error::Authentication {
                    title: "Login".into(),
                },
                ErrorKind::Authentication,
            ),
            (
                guild_portal::Error::HttpStatus {
                    status: 500,
                    body: String::new(),
                },
                ErrorKind::Transport,
            ),
            (guild_portal::Error::ReportRender, ErrorKind::ReportRender),
            (guild_portal::Error::NoData, ErrorKind::NoData),
            (
                guild_portal::Error::ExportUrlNotFound,
                ErrorKind::ExportUrlNotFound,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(ReportError::from(err).kind(), kind);
        }
    }

    #[test]
    fn every_pipeline_kind_has_one_terminal_state() {
        assert_eq!(
            ErrorKind::Authentication.terminal_state(),
            Some(FailureState::AuthFailed)
        );
        assert_eq!(
            ErrorKind::ReportRender.terminal_state(),
            Some(FailureState::PortalRejected)
        );
        assert_eq!(ErrorKind::NoData.terminal_state(), Some(FailureState::NoData));
        assert_eq!(
            ErrorKind::ExportUrlNotFound.terminal_state(),
            Some(FailureState::ExportNotFound)
        );
        assert_eq!(
            ErrorKind::Transport.terminal_state(),
            Some(FailureState::TransportFailed)
        );
        assert_eq!(ErrorKind::Validation.terminal_state(), None);
    }

    #[test]
    fn kind_names_match_wire_format() {
        assert_eq!(ErrorKind::NoData.to_string(), "NoDataError");
        assert_eq!(
            ReportError::InvalidInput("x".into()).kind().as_str(),
            "ValidationError"
        );
    }

    #[test]
    fn only_transport_is_retryable() {
        assert!(ErrorKind::Transport.is_retryable());
        assert!(!ErrorKind::Authentication.is_retryable());
        assert!(!ErrorKind::NoData.is_retryable());
    }
}
