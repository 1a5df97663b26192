//! Request payloads for the account operations.
//!
//! Every field is optional at this level: presence is a validation concern, so a missing field
//! turns into a `required` field message instead of a deserialization error.

use bytes::Bytes;
use portico_core::Input;
use serde::Deserialize;
use std::path::Path;

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Form field the file arrived in.
    pub field_name: String,
    /// Filename as sent by the client.
    pub client_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    pub fn extension(&self) -> &str {
        Path::new(&self.client_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub photo: Option<Upload>,
}

impl Registration {
    pub fn input(&self) -> Input {
        // a file without a declared type is treated as opaque bytes
        let photo_type = self
            .photo
            .as_ref()
            .map(|p| p.content_type.as_deref().unwrap_or("application/octet-stream"));

        Input::new()
            .with_opt("first_name", self.first_name.as_deref())
            .with_opt("last_name", self.last_name.as_deref())
            .with_opt("email", self.email.as_deref())
            .with_opt("password", self.password.as_deref())
            .with_opt("password_confirmation", self.password_confirmation.as_deref())
            .with_opt("photo", photo_type)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn input(&self) -> Input {
        Input::new()
            .with_opt("email", self.email.as_deref())
            .with_opt("password", self.password.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn input(&self) -> Input {
        Input::new()
            .with_opt("first_name", self.first_name.as_deref())
            .with_opt("last_name", self.last_name.as_deref())
            .with_opt("email", self.email.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordChange {
    /// Current password.
    pub password: Option<String>,
    pub new_password: Option<String>,
    pub new_password_confirmation: Option<String>,
}

impl PasswordChange {
    /// Only the new-password fields; the current password is verified, never rule-checked.
    pub fn input(&self) -> Input {
        Input::new()
            .with_opt("new_password", self.new_password.as_deref())
            .with_opt("new_password_confirmation", self.new_password_confirmation.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: Option<String>,
}
