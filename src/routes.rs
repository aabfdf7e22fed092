// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::actor::sub_admin_guard};

pub fn build_router(app_state: AppState) -> Router {
    let auth_routes = Router::new().route("/login", post(handlers::auth::login));

    // Unrestricted
    let admin_routes = Router::new()
        .route("/user", post(handlers::users::create_user).get(handlers::users::list_users))
        .route(
            "/user/{id}",
            put(handlers::users::update_user).delete(handlers::users::delete_user),
        )
        .route("/personnel", get(handlers::users::available_personnel))
        .route("/free", get(handlers::users::free_personnel))
        .route(
            "/weapon",
            post(handlers::weapons::create_weapon).get(handlers::weapons::list_weapons),
        )
        .route(
            "/weapon/{id}",
            put(handlers::weapons::update_weapon).delete(handlers::weapons::delete_weapon),
        )
        .route(
            "/task",
            post(handlers::tasks::admin_create_task).get(handlers::tasks::admin_list_tasks),
        )
        .route(
            "/task/{id}",
            put(handlers::tasks::admin_update_task).delete(handlers::tasks::admin_delete_task),
        );

    let sub_admin_routes = Router::new()
        .route("/personnel", get(handlers::personnel::my_personnel))
        .route("/personnel/{id}/update", put(handlers::personnel::update_personnel))
        .route("/personnel/{id}/clear-task", put(handlers::personnel::clear_personnel_task))
        .route("/task", post(handlers::tasks::create_task))
        .route(
            "/task/{id}",
            put(handlers::tasks::update_task).delete(handlers::tasks::delete_task),
        )
        .route("/tasks", get(handlers::tasks::list_tasks))
        .route("/weapon/available", get(handlers::weapons::available_weapons))
        .route("/weapon/{id}/assign", post(handlers::weapons::assign_weapon))
        .route("/weapon/{id}/unassign", put(handlers::weapons::unassign_weapon))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            sub_admin_guard,
        ));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/subadmin", sub_admin_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::very_permissive())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        db::{MemoryEntityStore, SharedStore},
        services::auth_service::hash_password,
        test_support::{admin, personnel, seed, sub_admin, weapon},
    };

    async fn app() -> (Router, SharedStore) {
        let store: SharedStore = Arc::new(MemoryEntityStore::new());
        let mut s1 = sub_admin("S1");
        s1.password_hash = Some(hash_password("s1-pass", 4).await.unwrap());
        seed(
            store.as_ref(),
            vec![
                admin("A1"),
                s1,
                sub_admin("S2"),
                personnel("U1", "S1"),
                personnel("U2", "S1"),
                personnel("U3", "S1"),
                personnel("U9", "S2"),
            ],
            vec![],
            vec![weapon("W1", None)],
        )
        .await;
        (build_router(AppState::from_store(store.clone(), 4)), store)
    }

    async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        actor: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header("x-sub-admin-id", actor);
        }
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let (router, _) = app().await;
        let (status, body) = call(&router, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("OK"));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (router, _) = app().await;
        let (status, body) = call(&router, "GET", "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/subadmin/task"].is_object());
    }

    #[tokio::test]
    async fn sub_admin_routes_need_a_sub_admin() {
        let (router, _) = app().await;

        let (missing, body) = call(&router, "GET", "/api/subadmin/personnel", None, None).await;
        let (wrong_role, _) = call(&router, "GET", "/api/subadmin/personnel", Some("U1"), None).await;

        assert_eq!(missing, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "unauthorized");
        assert_eq!(wrong_role, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn task_lifecycle_keeps_personnel_in_step() {
        let (router, _) = app().await;
        let create = json!({ "id": "T1", "title": "Patrol", "assignedTo": ["U1", "U2"] });

        let (status, body) = call(&router, "POST", "/api/subadmin/task", Some("S1"), Some(create)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["assignedBy"], "S1");
        assert!(body.get("warnings").is_none());

        let (_, personnel) = call(&router, "GET", "/api/subadmin/personnel", Some("S1"), None).await;
        let u1 = &personnel.as_array().unwrap()[0];
        assert_eq!(u1["id"], "U1");
        assert_eq!(u1["availability"], "tasked");
        assert_eq!(u1["currentTask"]["id"], "T1");
        assert!(u1.get("passwordHash").is_none());

        let update = json!({ "assignedTo": ["U2", "U3"] });
        let (status, _) = call(&router, "PUT", "/api/subadmin/task/T1", Some("S1"), Some(update)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, free) = call(&router, "GET", "/api/admin/free", None, None).await;
        let free_ids: Vec<&str> = free.as_array().unwrap().iter().filter_map(|u| u["id"].as_str()).collect();
        assert_eq!(free_ids, vec!["U1", "U9"]);

        let (status, _) = call(&router, "DELETE", "/api/subadmin/task/T1", Some("S1"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, free) = call(&router, "GET", "/api/admin/free", None, None).await;
        assert_eq!(free.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn foreign_assignees_are_listed_in_the_error() {
        let (router, store) = app().await;
        let create = json!({ "id": "T1", "title": "Patrol", "assignedTo": ["U1", "U9"] });

        let (status, body) = call(&router, "POST", "/api/subadmin/task", Some("S1"), Some(create)).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["details"]["ids"], json!(["U9"]));
        assert!(store.get_task("T1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_payload_reports_field_errors() {
        let (router, _) = app().await;
        let create = json!({ "id": "", "title": "Patrol" });

        let (status, body) = call(&router, "POST", "/api/subadmin/task", Some("S1"), Some(create)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
        assert!(body["details"]["id"].is_array());
    }

    #[tokio::test]
    async fn weapon_assignment_round_trip() {
        let (router, _) = app().await;

        let assign = json!({ "personnelId": "U1" });
        let (status, body) = call(&router, "POST", "/api/subadmin/weapon/W1/assign", Some("S1"), Some(assign)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["assignedTo"], "U1");

        let (_, users) = call(&router, "GET", "/api/admin/user", None, None).await;
        let u1 = users.as_array().unwrap().iter().find(|u| u["id"] == "U1").unwrap();
        assert_eq!(u1["weaponsAssigned"], json!(["W1"]));

        let (_, for_s2) = call(&router, "GET", "/api/subadmin/weapon/available", Some("S2"), None).await;
        assert_eq!(for_s2, json!([]));

        let (status, body) = call(&router, "PUT", "/api/subadmin/weapon/W1/unassign", Some("S1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["assignedTo"], Value::Null);
    }

    #[tokio::test]
    async fn admin_creates_then_reads_a_user() {
        let (router, _) = app().await;
        let create = json!({
            "id": "U4",
            "name": "Asha",
            "role": "personnel",
            "subAdminId": "S1",
            "serviceNumber": "CRPF-44",
            "password": "pw"
        });

        let (status, body) = call(&router, "POST", "/api/admin/user", None, Some(create)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "onduty");

        let (_, users) = call(&router, "GET", "/api/admin/user", None, None).await;
        let u4 = users.as_array().unwrap().iter().find(|u| u["id"] == "U4").unwrap();
        assert_eq!(u4["serviceNumber"], "CRPF-44");
        assert_eq!(u4["availability"], "free");

        let duplicate = json!({ "id": "U5", "name": "Dup", "role": "personnel", "serviceNumber": "CRPF-44" });
        let (status, body) = call(&router, "POST", "/api/admin/user", None, Some(duplicate)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "conflict");
    }

    #[tokio::test]
    async fn login_answers_with_identity() {
        let (router, _) = app().await;

        let good = json!({ "id": "S1", "password": "s1-pass" });
        let (status, body) = call(&router, "POST", "/api/auth/login", None, Some(good)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "sub-admin");

        let bad = json!({ "id": "S1", "password": "nope" });
        let (status, body) = call(&router, "POST", "/api/auth/login", None, Some(bad)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "invalid-credentials");
    }

    #[tokio::test]
    async fn leave_via_personnel_route_frees_the_task_slot() {
        let (router, store) = app().await;
        let create = json!({ "id": "T1", "title": "Patrol", "assignedTo": ["U1"] });
        call(&router, "POST", "/api/subadmin/task", Some("S1"), Some(create)).await;

        let leave = json!({ "status": "onleave" });
        let (status, body) = call(&router, "PUT", "/api/subadmin/personnel/U1/update", Some("S1"), Some(leave)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["currentTaskId"], Value::Null);
        assert!(store.get_task("T1").await.unwrap().unwrap().assigned_to.is_empty());
    }

    #[tokio::test]
    async fn whitespace_ids_are_rejected_on_create() {
        let (router, store) = app().await;
        let task = json!({ "id": "   ", "title": "Patrol" });
        let user = json!({ "id": " ", "name": "Nobody", "role": "personnel" });
        let weapon = json!({ "id": "\t", "name": "INSAS", "type": "Rifle" });

        let (task_status, task_body) = call(&router, "POST", "/api/subadmin/task", Some("S1"), Some(task)).await;
        let (user_status, _) = call(&router, "POST", "/api/admin/user", None, Some(user)).await;
        let (weapon_status, _) = call(&router, "POST", "/api/admin/weapon", None, Some(weapon)).await;

        assert_eq!(task_status, StatusCode::BAD_REQUEST);
        assert!(task_body["details"]["id"].is_array());
        assert_eq!(user_status, StatusCode::BAD_REQUEST);
        assert_eq!(weapon_status, StatusCode::BAD_REQUEST);
        assert!(store.get_task("").await.unwrap().is_none());
        assert!(store.get_user("").await.unwrap().is_none());
        assert!(store.get_weapon("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn padded_ids_are_stored_trimmed() {
        let (router, store) = app().await;
        let create = json!({ "id": " T7 ", "title": "Patrol" });

        let (status, body) = call(&router, "POST", "/api/subadmin/task", Some("S1"), Some(create)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["id"], "T7");
        assert!(store.get_task("T7").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn admin_cannot_put_a_sub_admin_on_a_task() {
        let (router, store) = app().await;
        let create = json!({ "id": "T1", "title": "Patrol" });
        call(&router, "POST", "/api/subadmin/task", Some("S1"), Some(create)).await;

        let patch = json!({ "currentTaskId": "T1" });
        let (status, body) = call(&router, "PUT", "/api/admin/user/S1", None, Some(patch)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
        assert!(store.get_task("T1").await.unwrap().unwrap().assigned_to.is_empty());
        assert_eq!(store.get_user("S1").await.unwrap().unwrap().current_task_id, None);
    }
}
