use crate::{
    AppState,
    auth::{self, AuthError, AuthUser},
    crud,
    entity::Entity,
    error::{AppError, AppResult},
    models::{
        LoginRequest, MessageResponse, MutationResponse, ProtectedResponse, RegisterRequest,
        RegisterResponse, Role, TokenResponse,
    },
    password,
    repository::RepositoryState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use chrono::{Duration, Utc};
use serde_json::json;

// --- Helpers ---

/// Maps axum's JSON body rejection into the API's own error shape.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(payload)| payload)
        .map_err(|rejection| AppError::validation_with("validation error", json!(rejection.body_text())))
}

/// Same for the `{id}` segment, so `/dogs/abc` is a JSON 400 like every other error.
fn path_id(id: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    id.map(|Path(id)| id)
        .map_err(|rejection| AppError::validation_with("validation error", json!(rejection.body_text())))
}

// Absent, empty and blank are the same thing for credentials.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// --- Service Handlers ---

/// index
///
/// [Public Route] Greeting.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Greeting", body = MessageResponse))
)]
pub async fn index() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to Canine Canaan!".to_string(),
    })
}

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates a credential and immediately issues an access token for it.
///
/// *Note*: the insert and the token issuance are not atomic. If signing fails after the
/// insert, the account exists and the caller simply logs in.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Missing field, unknown role or duplicate email"),
        (status = 500, description = "Database error")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let payload = json_body(payload)?;

    // 1. Presence of every field
    let (Some(email), Some(password), Some(role)) = (
        present(payload.email),
        present(payload.password),
        present(payload.role),
    ) else {
        return Err(AppError::validation("email, password, and role are required"));
    };

    // 2. Role must be one of the four
    let role: Role = role.parse().map_err(|err: crate::models::UnknownRole| {
        AppError::validation_with(
            "role must be one of: buyer, breeder, vet, admin",
            json!(err.to_string()),
        )
    })?;

    // 3. Hash and insert
    let password_hash = password::hash_password(&password).map_err(AppError::unexpected)?;
    let rows_affected = state
        .repo
        .create_user(&email, &password_hash, role)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                AppError::validation("email is already registered")
            } else {
                AppError::Database(e)
            }
        })?;

    // 4. Token
    let access_token =
        auth::issue_token(&state.config, &email, role).map_err(AppError::unexpected)?;

    tracing::info!(email = %email, role = %role, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "account is registered successfully".to_string(),
            rows_affected,
            access_token,
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges email and password for an access token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid password"),
        (status = 404, description = "User not found")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let payload = json_body(payload)?;

    let (Some(email), Some(password)) = (present(payload.email), present(payload.password)) else {
        return Err(AppError::validation("email and password are required"));
    };

    let user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    if !password::verify_password(&password, &user.password_hash).map_err(AppError::unexpected)? {
        tracing::info!(email = %email, "Login rejected: invalid password");
        return Err(AuthError::InvalidPassword.into());
    }

    let access_token =
        auth::issue_token(&state.config, &user.email, user.role).map_err(AppError::unexpected)?;

    tracing::info!(email = %user.email, "Logged in");
    Ok(Json(TokenResponse { access_token }))
}

/// logout
///
/// [Authenticated Route] Revokes the presented token by recording its `jti` in the blacklist
/// store. The token stays cryptographically valid until `exp`; only the blacklist lookup on
/// every later request rejects it.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Missing, invalid or revoked token"),
        (status = 500, description = "Could not record the revocation")
    ),
    security(("bearer" = []))
)]
pub async fn logout(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<MessageResponse>> {
    let expiration = Utc::now() + Duration::hours(state.config.token_ttl_hours);

    state
        .repo
        .revoke_token(&user.jti, expiration)
        .await
        .map_err(|e| AppError::Unexpected {
            message: "An error occurred during logout".to_string(),
            details: e.to_string(),
        })?;

    tracing::info!(email = %user.email, "Logged out");
    Ok(Json(MessageResponse {
        message: "successfully logged out".to_string(),
    }))
}

/// protected
///
/// [Authenticated Route] Echoes the verified token's identity and role.
#[utoipa::path(
    get,
    path = "/protected",
    responses((status = 200, description = "Token identity", body = ProtectedResponse)),
    security(("bearer" = []))
)]
pub async fn protected(AuthUser { email, role, .. }: AuthUser) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        logged_in_as: email,
        role,
    })
}

// --- Entity Handlers ---
//
// One generic handler per operation, instantiated per entity in `routes::entities`.
// Authorization has already happened in the role gate by the time these run.

/// `GET /<entities>`
pub async fn list<E: Entity>(
    State(repo): State<RepositoryState>,
) -> AppResult<Json<Vec<E::Record>>> {
    let records = crud::list_entities::<E>(repo.as_ref()).await?;
    Ok(Json(records))
}

/// `GET /<entities>/{id}`: 200 with zero or one record.
pub async fn get<E: Entity>(
    State(repo): State<RepositoryState>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Vec<E::Record>>> {
    let id = path_id(id)?;
    let records = crud::get_entity::<E>(repo.as_ref(), id).await?;
    Ok(Json(records))
}

/// `POST /<entities>`
pub async fn create<E: Entity>(
    State(repo): State<RepositoryState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<MutationResponse>)> {
    let response = crud::add_entity::<E>(repo.as_ref(), &body).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `PUT /<entities>/{id}`
///
/// The body is taken raw so the existence check can run before any parsing.
pub async fn update<E: Entity>(
    State(repo): State<RepositoryState>,
    id: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> AppResult<Json<MutationResponse>> {
    let id = path_id(id)?;
    let response = crud::update_entity::<E>(repo.as_ref(), id, &body).await?;
    Ok(Json(response))
}

/// `DELETE /<entities>/{id}`
pub async fn delete<E: Entity>(
    State(repo): State<RepositoryState>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<MutationResponse>> {
    let id = path_id(id)?;
    let response = crud::delete_entity(repo.as_ref(), E::DESCRIPTOR, id).await?;
    Ok(Json(response))
}
