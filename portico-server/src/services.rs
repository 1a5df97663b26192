mod account;
mod avatar;
mod credentials;
mod error;
mod session;
mod validation;

pub use account::{AccountService, Authenticated};
pub use avatar::{AvatarUploader, FsAvatarUploader, UploadError};
pub use credentials::{Argon2Verifier, CredentialVerifier};
pub use session::{AccessToken, MemorySessions, SessionIssuer};
pub use validation::{RuleValidator, ValidationGateway};

pub use error::{ServiceError, ServiceResult};
