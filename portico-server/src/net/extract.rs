use crate::models::types::AccountId;
use crate::net::AppCtx;
use crate::services::ServiceError;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::{Form, Json};
use serde::de::DeserializeOwned;
use std::convert::Infallible;

/// The account behind the request's bearer token, if any.
///
/// Never rejects: a missing, malformed, unknown or expired token all yield `None`, and each
/// operation decides what an anonymous caller gets.
#[derive(Debug, Clone, Copy)]
pub struct CurrentAccount(pub Option<AccountId>);

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppCtx> for CurrentAccount {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppCtx) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer(parts) else {
            return Ok(CurrentAccount(None));
        };

        match ctx.registry.services.sessions.resolve(token).await {
            Ok(account_id) => Ok(CurrentAccount(account_id)),
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                Ok(CurrentAccount(None))
            }
        }
    }
}

/// Request body decoded from JSON or from an urlencoded form, picked by `Content-Type`.
///
/// Rejections become [`ServiceError`]s so a bad body gets the same envelope as every other
/// failure; the decoder's own message is only logged.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Maps an extractor rejection onto the client-facing error.
pub fn rejected(status: StatusCode, detail: &str) -> ServiceError {
    tracing::warn!(%status, detail, "request body rejected");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge
    } else {
        ServiceError::MalformedBody
    }
}

impl<T> FromRequest<AppCtx> for Payload<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, ctx: &AppCtx) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            match Form::<T>::from_request(req, ctx).await {
                Ok(Form(value)) => Ok(Payload(value)),
                Err(e) => Err(rejected(e.status(), &e.body_text())),
            }
        } else {
            match Json::<T>::from_request(req, ctx).await {
                Ok(Json(value)) => Ok(Payload(value)),
                Err(e) => Err(rejected(e.status(), &e.body_text())),
            }
        }
    }
}
