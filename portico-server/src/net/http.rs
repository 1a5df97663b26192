use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::{MultipartError, MultipartRejection}},
    routing::{get, post, put},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::Registry;
use crate::error::{AppResult, InfraError};
use crate::models::account::{Account, AccountView};
use crate::models::forms::{Credentials, PasswordChange, ProfileUpdate, Registration, SearchQuery, Upload};
use crate::net::AppCtx;
use crate::net::extract::{CurrentAccount, Payload, rejected};
use crate::net::response::{DataBody, StatusBody};
use crate::services::{Authenticated, ServiceError};

/// Room for the text fields and multipart framing on top of the photo itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(registry: Arc<Registry>) -> Router {
    let photos = ServeDir::new(&registry.config.photo_dir);
    let body_limit = registry.config.max_photo_bytes.saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile).put(update_profile))
        .route("/profile/password", put(change_password))
        .route("/users/search", get(search))
        .nest_service("/uploads/photos", photos)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppCtx { registry })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

/// Run the HTTP API until the listener fails.
pub async fn serve(addr: SocketAddr, registry: Arc<Registry>) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(InfraError::from)?;
    tracing::info!(%addr, "Portico HTTP API listening");

    axum::serve(listener, router(registry)).await.map_err(InfraError::from)?;
    Ok(())
}

async fn read_registration(mut multipart: Multipart) -> Result<Registration, MultipartError> {
    let mut form = Registration::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == "photo" {
            let client_name = field.file_name().unwrap_or_default().to_owned();
            let content_type = field.content_type().map(str::to_owned);
            let bytes = field.bytes().await?;
            // browsers send an empty part when no file was picked
            if client_name.is_empty() && bytes.is_empty() {
                continue;
            }
            form.photo = Some(Upload { field_name: name, client_name, content_type, bytes });
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "first_name" => form.first_name = Some(value),
            "last_name" => form.last_name = Some(value),
            "email" => form.email = Some(value),
            "password" => form.password = Some(value),
            "password_confirmation" => form.password_confirmation = Some(value),
            _ => {}
        }
    }

    Ok(form)
}

async fn register(
    State(ctx): State<AppCtx>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Authenticated>, ServiceError> {
    let multipart = multipart.map_err(|e| rejected(e.status(), &e.body_text()))?;
    let form = read_registration(multipart)
        .await
        .map_err(|e| rejected(e.status(), &e.body_text()))?;

    ctx.registry.services.account.register(form).await.map(Json)
}

async fn login(State(ctx): State<AppCtx>, Payload(form): Payload<Credentials>) -> Result<Json<Authenticated>, ServiceError> {
    ctx.registry.services.account.login(form).await.map(Json)
}

async fn update_profile(
    State(ctx): State<AppCtx>,
    CurrentAccount(identity): CurrentAccount,
    Payload(form): Payload<ProfileUpdate>,
) -> Result<Json<StatusBody<Account>>, ServiceError> {
    let account = ctx.registry.services.account.update_profile(identity, form).await?;
    Ok(Json(StatusBody::success_with("Profile updated!", account)))
}

async fn change_password(
    State(ctx): State<AppCtx>,
    CurrentAccount(identity): CurrentAccount,
    Payload(form): Payload<PasswordChange>,
) -> Result<Json<StatusBody<()>>, ServiceError> {
    ctx.registry.services.account.change_password(identity, form).await?;
    Ok(Json(StatusBody::success("Password updated!")))
}

async fn search(
    State(ctx): State<AppCtx>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<DataBody<Vec<Account>>>, ServiceError> {
    let data = ctx.registry.services.account.search(query.q.as_deref()).await?;
    Ok(Json(DataBody { data }))
}

async fn profile(
    State(ctx): State<AppCtx>,
    CurrentAccount(identity): CurrentAccount,
) -> Result<Json<DataBody<AccountView>>, ServiceError> {
    let data = ctx.registry.services.account.profile(identity).await?;
    Ok(Json(DataBody { data }))
}
