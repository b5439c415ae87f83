mod common;

use axum::http::StatusCode;
use common::{acquire_db_lock, read_json, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

fn user_payload(email: &str, role: &str) -> Value {
    json!({
        "users": {
            "emailAddress": email,
            "name": "Jo Citizen",
            "role": role,
        },
        "update_details": {"updated_by": "admin@example.gov.au"},
    })
}

#[tokio::test]
async fn create_get_and_update_a_user() {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await.expect("test app") else { return };

    let response = app
        .post_json("/users", &user_payload("Jo@Example.Gov.AU", "buyer"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await.expect("json body");
    // Email addresses are stored lowercased; credentials never appear.
    assert_eq!(body["users"]["emailAddress"], json!("jo@example.gov.au"));
    assert_eq!(body["users"]["role"], json!("buyer"));
    assert!(body["users"].get("password").is_none());

    let user_id = Uuid::parse_str(body["users"]["id"].as_str().expect("id")).expect("uuid");

    let response = app
        .post_json(
            &format!("/users/{user_id}"),
            &json!({
                "users": {"role": "admin"},
                "update_details": {"updated_by": "admin@example.gov.au"},
            }),
        )
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await.expect("json body");
    assert_eq!(body["users"]["role"], json!("admin"));

    let events = app.audit_events_for("users", user_id).await.expect("events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], json!("create_user"));
    assert_eq!(events[1]["type"], json!("update_user"));
}

#[tokio::test]
async fn unknown_roles_are_rejected() {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await.expect("test app") else { return };

    let response = app
        .post_json("/users", &user_payload("jo@example.gov.au", "overlord"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await.expect("json body");
    assert_eq!(body["error"], json!("Invalid user role 'overlord'"));
}

#[tokio::test]
async fn duplicate_email_is_an_integrity_error_not_a_500() {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await.expect("test app") else { return };

    let payload = user_payload("jo@example.gov.au", "buyer");
    let response = app.post_json("/users", &payload).await.expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.post_json("/users", &payload).await.expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await.expect("json body");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn supplier_updates_merge_data_and_audit() {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await.expect("test app") else { return };

    let supplier_id = app.insert_supplier("Acme Digital").await.expect("supplier");

    let response = app
        .post_json(
            &format!("/suppliers/{supplier_id}"),
            &json!({
                "supplier": {"summary": " trimmed summary ", "website": "https://acme.example"},
                "update_details": {"updated_by": "admin@example.gov.au"},
            }),
        )
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await.expect("json body");
    assert_eq!(body["supplier"]["summary"], json!("trimmed summary"));
    assert_eq!(body["supplier"]["status"], json!("limited"));

    let events = app
        .audit_events_for("suppliers", supplier_id)
        .await
        .expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], json!("supplier_update"));
    assert_eq!(
        events[0]["data"]["supplierJson"]["website"],
        json!("https://acme.example")
    );
}

#[tokio::test]
async fn audit_listing_filters_by_object_and_type() {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await.expect("test app") else { return };

    let response = app
        .post_json("/users", &user_payload("jo@example.gov.au", "buyer"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await.expect("json body");
    let user_id = body["users"]["id"].as_str().expect("id").to_owned();

    let body = read_json(
        app.get(&format!("/audit-events?object_type=users&object_id={user_id}"))
            .await
            .expect("get"),
    )
    .await
    .expect("json body");
    let events = body["auditEvents"].as_array().expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], json!("create_user"));
    assert_eq!(events[0]["user"], json!("admin@example.gov.au"));
    assert!(events[0]["createdAt"].is_string());

    // Unknown audit types are rejected rather than silently matching nothing.
    let response = app
        .get("/audit-events?audit_type=made_up_event")
        .await
        .expect("get");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn frameworks_listing_shows_seeded_lots() {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await.expect("test app") else { return };

    let body = read_json(app.get("/frameworks").await.expect("get"))
        .await
        .expect("json body");
    let frameworks = body["frameworks"].as_array().cloned().expect("frameworks");
    let marketplace = frameworks
        .iter()
        .find(|framework| framework["slug"] == json!(common::FRAMEWORK_SLUG))
        .expect("seeded framework");

    assert_eq!(marketplace["status"], json!("live"));
    let lots = marketplace["lots"].as_array().expect("lots");
    assert!(lots
        .iter()
        .any(|lot| lot["slug"] == json!("user-research-studios") && lot["allowsBrief"] == json!(false)));
}
