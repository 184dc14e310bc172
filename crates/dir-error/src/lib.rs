//! The error taxonomy shared by every component of the directory core (§7).

/// Component-neutral error taxonomy. Lower layers produce these directly;
/// the gRPC façade maps each variant to the nearest `tonic::Status` code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(anyhow::anyhow!(msg.into()))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound(err.to_string()),
            other => Error::Unavailable(other.to_string()),
        }
    }
}

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
            Error::NotFound(msg) => tonic::Status::not_found(msg),
            Error::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            Error::Corrupt(msg) => tonic::Status::data_loss(msg),
            Error::Unavailable(msg) => tonic::Status::unavailable(msg),
            Error::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            Error::Internal(err) => tonic::Status::internal(err.to_string()),
        }
    }
}
