use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ActivityDraft, ActivityId, ApplicationId, CategoryId, DeptId, UserId};
use super::lifecycle::LifecycleError;
use super::repository::VolunteerStore;
use super::service::VolunteerHub;

/// Router builder exposing the activity catalog and application lifecycle over HTTP.
pub fn volunteer_router<S>(hub: Arc<VolunteerHub<S>>) -> Router
where
    S: VolunteerStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/activities",
            get(list_activities_handler::<S>).post(create_activity_handler::<S>),
        )
        .route("/api/v1/activities/search", get(search_activities_handler::<S>))
        .route(
            "/api/v1/activities/available",
            get(available_activities_handler::<S>),
        )
        .route(
            "/api/v1/activities/:activity_id",
            get(activity_handler::<S>)
                .put(update_activity_handler::<S>)
                .delete(delete_activity_handler::<S>),
        )
        .route("/api/v1/activities/:activity_id/apply", post(apply_handler::<S>))
        .route(
            "/api/v1/activities/:activity_id/applications",
            get(activity_applications_handler::<S>),
        )
        .route("/api/v1/users", post(register_user_handler::<S>))
        .route(
            "/api/v1/users/:user_id/applications",
            get(user_applications_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id",
            delete(cancel_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/status",
            post(update_status_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/history",
            get(status_history_handler::<S>),
        )
        .with_state(hub)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListActivitiesParams {
    pub(crate) dept_id: Option<i64>,
    pub(crate) category_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    pub(crate) keyword: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailableParams {
    pub(crate) user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ApplyRequest {
    pub(crate) user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct UpdateStatusRequest {
    pub(crate) status: String,
    pub(crate) handler_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RegisterUserRequest {
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) role_name: Option<String>,
}

/// Storage faults surface as 500; every other failure is the caller's to fix.
pub(crate) fn error_response(error: LifecycleError) -> Response {
    let status = if error.is_storage() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_REQUEST
    };
    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind().label(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, LifecycleError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_activities_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Query(params): Query<ListActivitiesParams>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    let result = hub
        .activities
        .list(params.dept_id.map(DeptId), params.category_id.map(CategoryId));
    respond(StatusCode::OK, result)
}

pub(crate) async fn search_activities_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Query(params): Query<SearchParams>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(StatusCode::OK, hub.activities.search(&params.keyword))
}

pub(crate) async fn available_activities_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Query(params): Query<AvailableParams>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(StatusCode::OK, hub.activities.available_for(UserId(params.user_id)))
}

pub(crate) async fn create_activity_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Json(draft): Json<ActivityDraft>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(StatusCode::CREATED, hub.activities.create(draft))
}

pub(crate) async fn activity_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(activity_id): Path<i64>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(StatusCode::OK, hub.activities.get(ActivityId(activity_id)))
}

pub(crate) async fn update_activity_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(activity_id): Path<i64>,
    Json(draft): Json<ActivityDraft>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(
        StatusCode::OK,
        hub.activities.update(ActivityId(activity_id), draft),
    )
}

pub(crate) async fn delete_activity_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(activity_id): Path<i64>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(StatusCode::OK, hub.activities.delete(ActivityId(activity_id)))
}

pub(crate) async fn apply_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(activity_id): Path<i64>,
    Json(request): Json<ApplyRequest>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(
        StatusCode::CREATED,
        hub.applications.apply(request.user_id, ActivityId(activity_id)),
    )
}

pub(crate) async fn activity_applications_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(activity_id): Path<i64>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(
        StatusCode::OK,
        hub.applications.applications_for_activity(ActivityId(activity_id)),
    )
}

pub(crate) async fn register_user_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Json(request): Json<RegisterUserRequest>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(
        StatusCode::CREATED,
        hub.users.register(&request.username, request.role_name.as_deref()),
    )
}

pub(crate) async fn user_applications_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(user_id): Path<i64>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(
        StatusCode::OK,
        hub.applications.applications_for_user(UserId(user_id)),
    )
}

pub(crate) async fn update_status_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(application_id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(
        StatusCode::OK,
        hub.applications.update_status(
            ApplicationId(application_id),
            &request.status,
            request.handler_id,
        ),
    )
}

pub(crate) async fn cancel_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(application_id): Path<i64>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    match hub.applications.cancel(ApplicationId(application_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_history_handler<S>(
    State(hub): State<Arc<VolunteerHub<S>>>,
    Path(application_id): Path<i64>,
) -> Response
where
    S: VolunteerStore + 'static,
{
    respond(
        StatusCode::OK,
        hub.applications.status_history(ApplicationId(application_id)),
    )
}
