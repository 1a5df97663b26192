use crate::db::DbResult;
use crate::models::types::AccountId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;
use url::Url;

/// Public path prefix under which stored avatars are served.
pub const PHOTO_PATH: [&str; 2] = ["uploads", "photos"];

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Stored avatar filename, `<first_name>.<ext>`.
    pub photo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account as returned by the profile endpoint: `photo` is a full URL and `name` is derived.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub photo: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        photo: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            photo: photo.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get::<_, AccountId>("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            photo: row.try_get("photo")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Avatar filename: the first name plus the uploaded file's extension.
    pub fn photo_name(first_name: &str, extension: &str) -> String {
        format!("{first_name}.{extension}")
    }

    pub fn view(&self, app_url: &Url) -> AccountView {
        AccountView {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            photo: photo_url(app_url, &self.photo),
            name: portico_core::display_name(&self.first_name, &self.last_name),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// `app_url` + `/uploads/photos/` + the percent-encoded filename.
pub fn photo_url(app_url: &Url, photo: &str) -> String {
    let mut url = app_url.clone();
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty().extend(PHOTO_PATH).push(photo);
        }
        // cannot-be-a-base urls (mailto: and friends) never make sense here
        Err(()) => return format!("{app_url}/{}/{photo}", PHOTO_PATH.join("/")),
    }
    url.to_string()
}
