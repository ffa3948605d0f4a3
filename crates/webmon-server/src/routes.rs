use std::sync::Arc;

use axum::Extension;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::{TimeDelta, Utc};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use webmon_core::traits::WatchStore;
use webmon_core::watch::{NewWatch, Watch};

use crate::auth::{AuthUser, require_user};
use crate::dto::{
    CreateWatchRequest, ErrorResponse, HealthResponse, UpdateWatchRequest, ValueListResponse,
    ValueResponse, WatchListResponse, WatchResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/watches", get(list_watches).post(create_watch))
        .route(
            "/v1/watches/{id}",
            get(get_watch).put(update_watch).delete(delete_watch),
        )
        .route("/v1/watches/{id}/value", get(latest_value))
        .route("/v1/watches/{id}/value/all", get(list_values))
        .layer(middleware::from_fn_with_state(state.clone(), require_user));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

/// Load a watch and enforce ownership: unknown ids are 404, someone else's
/// watch is 401 (the API does not reveal whether the id exists to
/// non-owners beyond that).
async fn load_owned(
    state: &AppState,
    id: Uuid,
    user: &AuthUser,
) -> Result<Result<Watch, axum::response::Response>, ApiError> {
    let watch = state.db.watch_repo().get_watch(id).await?;
    match watch {
        None => {
            let body = ErrorResponse {
                error: "not_found".to_string(),
                message: format!("Watch not found: {id}"),
            };
            Ok(Err((StatusCode::NOT_FOUND, axum::Json(body)).into_response()))
        }
        Some(watch) if watch.owner != user.id => {
            let body = ErrorResponse {
                error: "unauthorized".to_string(),
                message: "You do not own this watch".to_string(),
            };
            Ok(Err(
                (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
            ))
        }
        Some(watch) => Ok(Ok(watch)),
    }
}

// ---------------------------------------------------------------------------
// Watches
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/watches",
    responses(
        (status = 200, description = "The caller's watches", body = WatchListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "watches"
)]
pub async fn list_watches(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let watches = state.db.watch_repo().list_watches(user.id).await?;
    let total = watches.len();

    let response = WatchListResponse {
        watches: watches.into_iter().map(WatchResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response))
}

#[utoipa::path(
    post,
    path = "/v1/watches",
    request_body = CreateWatchRequest,
    responses(
        (status = 201, description = "Watch created", body = WatchResponse),
        (status = 400, description = "Validation failure", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "watches"
)]
pub async fn create_watch(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    axum::Json(body): axum::Json<CreateWatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;

    let new = NewWatch::new(
        body.name,
        body.url,
        body.xpath,
        TimeDelta::seconds(body.period_seconds),
        body.notify.unwrap_or(false),
        user.id,
        Utc::now(),
    )?;

    let watch = state.db.watch_repo().create_watch(new).await?;

    Ok((StatusCode::CREATED, axum::Json(WatchResponse::from(watch))))
}

#[utoipa::path(
    get,
    path = "/v1/watches/{id}",
    params(
        ("id" = Uuid, Path, description = "Watch ID")
    ),
    responses(
        (status = 200, description = "Watch details", body = WatchResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "watches"
)]
pub async fn get_watch(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match load_owned(&state, id, &user).await? {
        Ok(watch) => Ok(axum::Json(WatchResponse::from(watch)).into_response()),
        Err(response) => Ok(response),
    }
}

#[utoipa::path(
    put,
    path = "/v1/watches/{id}",
    params(
        ("id" = Uuid, Path, description = "Watch ID")
    ),
    request_body = UpdateWatchRequest,
    responses(
        (status = 200, description = "Updated watch", body = WatchResponse),
        (status = 400, description = "Validation failure", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "watches"
)]
pub async fn update_watch(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<UpdateWatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match load_owned(&state, id, &user).await? {
        Ok(_) => {
            body.validate()?;
            let update = body.into_update();
            update.validate()?;

            match state.db.watch_repo().update_watch(id, update).await? {
                Some(watch) => Ok(axum::Json(WatchResponse::from(watch)).into_response()),
                // Deleted between the ownership check and the update.
                None => {
                    let body = ErrorResponse {
                        error: "not_found".to_string(),
                        message: format!("Watch not found: {id}"),
                    };
                    Ok((StatusCode::NOT_FOUND, axum::Json(body)).into_response())
                }
            }
        }
        Err(response) => Ok(response),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/watches/{id}",
    params(
        ("id" = Uuid, Path, description = "Watch ID")
    ),
    responses(
        (status = 204, description = "Watch deleted, values cascade"),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "watches"
)]
pub async fn delete_watch(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match load_owned(&state, id, &user).await? {
        Ok(_) => {
            state.db.watch_repo().delete_watch(id).await?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Err(response) => Ok(response),
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/watches/{id}/value",
    params(
        ("id" = Uuid, Path, description = "Watch ID")
    ),
    responses(
        (status = 200, description = "Most recently recorded value", body = ValueResponse),
        (status = 404, description = "Watch unknown or no values recorded", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "values"
)]
pub async fn latest_value(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match load_owned(&state, id, &user).await? {
        Ok(watch) => match state.db.watch_repo().get_latest_value(watch.id).await? {
            Some(value) => Ok(axum::Json(ValueResponse::from(value)).into_response()),
            None => {
                let body = ErrorResponse {
                    error: "not_found".to_string(),
                    message: format!("No values recorded for watch {id}"),
                };
                Ok((StatusCode::NOT_FOUND, axum::Json(body)).into_response())
            }
        },
        Err(response) => Ok(response),
    }
}

#[utoipa::path(
    get,
    path = "/v1/watches/{id}/value/all",
    params(
        ("id" = Uuid, Path, description = "Watch ID")
    ),
    responses(
        (status = 200, description = "All recorded values, oldest first", body = ValueListResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "values"
)]
pub async fn list_values(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match load_owned(&state, id, &user).await? {
        Ok(watch) => {
            let values = state.db.watch_repo().list_values(watch.id).await?;
            let total = values.len();
            let response = ValueListResponse {
                values: values.into_iter().map(ValueResponse::from).collect(),
                total,
            };
            Ok(axum::Json(response).into_response())
        }
        Err(response) => Ok(response),
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        database: db_status,
    };

    (status, axum::Json(response))
}
