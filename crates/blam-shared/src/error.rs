use thiserror::Error;

/// Input rejected before any remote call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No authenticated user")]
    NotAuthenticated,

    #[error("A song must be attached")]
    MissingSong,

    #[error("Required field is empty: {0}")]
    EmptyField(&'static str),

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already exists")]
    EmailTaken,

    #[error("No account registered for this email")]
    UnknownEmail,
}
