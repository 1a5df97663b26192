use crate::services::avatar::UploadError;
use portico_core::FieldMessage;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// ServiceError is what account operations hand back to the caller. Every collaborator failure is
/// translated into one of these kinds inside the service; store and hashing details are logged
/// there and never carried along.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Field-level rule failures, safe to show verbatim.
    #[error("validation failed")]
    Validation(Vec<FieldMessage>),

    /// Login failed. Deliberately says nothing about which half was wrong.
    #[error("Email and password does not match with any account !")]
    CredentialMismatch,

    #[error("Current password could not be verified! Please try again.")]
    CurrentPasswordMismatch,

    #[error("upload failed: {}", .0.message)]
    Upload(UploadError),

    /// Store or hashing failure; the message is the generic text shown to the client.
    #[error("{0}")]
    Persistence(&'static str),

    /// Request body could not be decoded into the operation's input.
    #[error("The request body could not be read.")]
    MalformedBody,

    #[error("The request body is too large.")]
    PayloadTooLarge,

    #[error("not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,
}

impl ServiceError {
    pub fn field(field: &str, validation: &'static str) -> Self {
        ServiceError::Validation(vec![FieldMessage::new(field, validation)])
    }
}
