use std::{fmt::Display, io, path::PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The remote call that was in flight when a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Login,
    RequestSlot,
    RawUpload,
    SetMetadata,
    Transcode,
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Login => write!(f, "Login"),
            Step::RequestSlot => write!(f, "Upload slot request"),
            Step::RawUpload => write!(f, "File upload"),
            Step::SetMetadata => write!(f, "Video metadata update"),
            Step::Transcode => write!(f, "Transcode request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorKind {
    UserNotFound,
    IncorrectPassword,
    /// Any other error code reported by the auth endpoint.
    Other(String),
}

impl AuthErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "UserDoesNotExist" => AuthErrorKind::UserNotFound,
            "AuthError" => AuthErrorKind::IncorrectPassword,
            other => AuthErrorKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{step} failed: {status} - {body}")]
    Transport {
        step: Step,
        status: StatusCode,
        body: String,
    },
    #[error("{step} failed")]
    Network {
        step: Step,
        #[source]
        source: reqwest::Error,
    },
    #[error("{step} returned an unexpected response")]
    Decode {
        step: Step,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unable to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} does not name a file", path.display())]
    InvalidPath { path: PathBuf },
    #[error("Invalid endpoint URL")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn auth_kind(&self) -> Option<&AuthErrorKind> {
        match self {
            Error::Auth(auth) => Some(&auth.kind),
            _ => None,
        }
    }

    /// The step a request-level failure happened in, if any.
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Transport { step, .. }
            | Error::Network { step, .. }
            | Error::Decode { step, .. } => Some(*step),
            Error::Auth(_) => Some(Step::Login),
            Error::Io { .. } | Error::InvalidPath { .. } | Error::Url(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_kind_from_code() {
        assert_eq!(
            AuthErrorKind::from_code("UserDoesNotExist"),
            AuthErrorKind::UserNotFound
        );
        assert_eq!(
            AuthErrorKind::from_code("AuthError"),
            AuthErrorKind::IncorrectPassword
        );
        assert_eq!(
            AuthErrorKind::from_code("AccountLocked"),
            AuthErrorKind::Other("AccountLocked".to_string())
        );
    }

    #[test]
    fn test_transport_error_message() {
        let err = Error::Transport {
            step: Step::SetMetadata,
            status: StatusCode::FORBIDDEN,
            body: "nope".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Video metadata update failed: 403 Forbidden - nope"
        );
        assert_eq!(err.step(), Some(Step::SetMetadata));
        assert!(err.auth_kind().is_none());
    }

    #[test]
    fn test_auth_error_is_login_step() {
        let err = Error::from(AuthError {
            kind: AuthErrorKind::IncorrectPassword,
            message: "Wrong password".to_string(),
        });
        assert_eq!(err.to_string(), "Wrong password");
        assert_eq!(err.step(), Some(Step::Login));
        assert_eq!(err.auth_kind(), Some(&AuthErrorKind::IncorrectPassword));
    }
}
