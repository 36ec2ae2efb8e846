use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::volunteering::router::{
    apply_handler, cancel_handler, error_response, ApplyRequest,
};
use crate::workflows::volunteering::{volunteer_router, LifecycleError, RepositoryError};

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return (status, Value::Null);
    }
    (status, read_json_body(response).await)
}

#[tokio::test]
async fn apply_handler_reports_business_rules_as_bad_request() {
    let (hub, _) = build_hub();
    let alice = register(&hub, "alice");
    let activity = create(&hub, "Park cleanup", "2030-06-10 14:00", 2);

    let response = apply_handler(
        State(hub.clone()),
        Path(activity.0),
        axum::Json(ApplyRequest { user_id: alice }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = apply_handler(
        State(hub.clone()),
        Path(activity.0),
        axum::Json(ApplyRequest { user_id: alice }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "already applied");
    assert_eq!(body["kind"], "business_rule");
}

#[tokio::test]
async fn cancel_handler_returns_no_content() {
    let (hub, _) = build_hub();
    let alice = register(&hub, "alice");
    let activity = create(&hub, "Park cleanup", "2030-06-10 14:00", 2);
    let application = hub.applications.apply(alice, activity).expect("apply");

    let response = cancel_handler(State(hub.clone()), Path(application.application_id.0)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = cancel_handler(State(hub), Path(application.application_id.0)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn storage_errors_map_to_internal_server_error() {
    let response = error_response(LifecycleError::Storage(RepositoryError::Unavailable(
        "database offline".to_string(),
    )));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "storage");

    let (hub, _) = build_hub_with(FaultyStore::default());
    hub.store().go_offline();
    let router = volunteer_router(hub);
    let (status, body) = send(&router, empty_request("GET", "/api/v1/activities")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("database offline"));
}

#[tokio::test]
async fn full_application_flow_over_http() {
    let (hub, _) = build_hub();
    let router = volunteer_router(hub);

    let (status, admin) = send(
        &router,
        json_request(
            "POST",
            "/api/v1/users",
            json!({ "username": "coordinator", "role_name": "admin" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let admin_id = admin["user_id"].as_i64().expect("admin id");

    let (_, alice) = send(
        &router,
        json_request("POST", "/api/v1/users", json!({ "username": "alice" })),
    )
    .await;
    let alice_id = alice["user_id"].as_i64().expect("alice id");

    let (status, activity) = send(
        &router,
        json_request(
            "POST",
            "/api/v1/activities",
            json!({
                "dept_id": 1,
                "category_id": 2,
                "creator_id": admin_id,
                "title": "River Cleanup",
                "activity_time": "2030-06-10 14:00",
                "location": "North bank",
                "max_people": 1
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(activity["status"], "active");
    let activity_id = activity["activity_id"].as_i64().expect("activity id");

    let (status, application) = send(
        &router,
        json_request(
            "POST",
            &format!("/api/v1/activities/{activity_id}/apply"),
            json!({ "user_id": alice_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(application["current_status"], "pending");
    let application_id = application["application_id"].as_i64().expect("application id");

    let (status, updated) = send(
        &router,
        json_request(
            "POST",
            &format!("/api/v1/applications/{application_id}/status"),
            json!({ "status": "Approved", "handler_id": admin_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["current_status"], "approved");

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            &format!("/api/v1/applications/{application_id}/status"),
            json!({ "status": "on hold", "handler_id": admin_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, history) = send(
        &router,
        empty_request("GET", &format!("/api/v1/applications/{application_id}/history")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = history
        .as_array()
        .expect("history array")
        .iter()
        .filter_map(|log| log["log_status"].as_str())
        .collect();
    assert_eq!(statuses, vec!["pending", "approved"]);

    let (_, roster) = send(
        &router,
        empty_request("GET", &format!("/api/v1/activities/{activity_id}/applications")),
    )
    .await;
    assert_eq!(roster[0]["username"], "alice");

    let (_, mine) = send(
        &router,
        empty_request("GET", &format!("/api/v1/users/{alice_id}/applications")),
    )
    .await;
    assert_eq!(mine[0]["title"], "River Cleanup");

    let (status, _) = send(
        &router,
        empty_request("DELETE", &format!("/api/v1/applications/{application_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, summary) = send(
        &router,
        empty_request("DELETE", &format!("/api/v1/activities/{activity_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["applications"], 0);

    let (status, body) = send(
        &router,
        empty_request("GET", &format!("/api/v1/activities/{activity_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "activity not found");
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn search_and_available_routes_read_query_strings() {
    let (hub, _) = build_hub();
    let alice = register(&hub, "alice");
    create(&hub, "Park cleanup", "2030-06-10 14:00", 3);
    create(&hub, "Pantry shift", "2030-06-11 09:00", 3);
    let router = volunteer_router(hub);

    let (status, found) = send(
        &router,
        empty_request("GET", "/api/v1/activities/search?keyword=pantry"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().expect("array").len(), 1);
    assert_eq!(found[0]["title"], "Pantry shift");

    let (status, available) = send(
        &router,
        empty_request(
            "GET",
            &format!("/api/v1/activities/available?user_id={}", alice.0),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(available[0]["title"], "Park cleanup");
    assert_eq!(available[0]["remaining_slots"], 3);
}
