use axum::http::HeaderValue;
use axum::{
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod applications;
pub mod audit;
pub mod brief_responses;
pub mod briefs;
pub mod frameworks;
pub mod health;
pub mod suppliers;
pub mod users;
pub mod work_orders;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    };

    let briefs_routes = Router::new()
        .route("/", get(briefs::list_briefs).post(briefs::create_brief))
        .route(
            "/:id",
            get(briefs::get_brief)
                .post(briefs::update_brief)
                .delete(briefs::delete_brief),
        )
        .route("/:id/status", put(briefs::update_brief_status))
        .route("/:id/copy", post(briefs::copy_brief))
        .route(
            "/:id/clarification-questions",
            post(briefs::create_clarification_question),
        );

    let brief_responses_routes = Router::new()
        .route("/", post(brief_responses::create_brief_response))
        .route(
            "/:id",
            get(brief_responses::get_brief_response)
                .post(brief_responses::update_brief_response),
        )
        .route("/:id/submit", post(brief_responses::submit_brief_response))
        .route(
            "/:id/withdraw",
            post(brief_responses::withdraw_brief_response),
        );

    let work_orders_routes = Router::new()
        .route("/", post(work_orders::create_work_order))
        .route(
            "/:id",
            get(work_orders::get_work_order).post(work_orders::update_work_order),
        );

    let applications_routes = Router::new()
        .route(
            "/",
            get(applications::list_applications).post(applications::create_application),
        )
        .route(
            "/:id",
            get(applications::get_application)
                .post(applications::update_application)
                .delete(applications::delete_application),
        )
        .route("/:id/submit", post(applications::submit_application))
        .route("/:id/approve", post(applications::approve_application))
        .route("/:id/reject", post(applications::reject_application))
        .route("/:id/revert", post(applications::revert_application))
        .route("/:id/unreject", post(applications::unreject_application))
        .route("/:id/assessment", post(applications::assess_application))
        .route("/:id/unassess", post(applications::unassess_application));

    let users_routes = Router::new()
        .route("/", post(users::create_user))
        .route("/:id", get(users::get_user).post(users::update_user));

    let suppliers_routes = Router::new().route(
        "/:id",
        get(suppliers::get_supplier).post(suppliers::update_supplier),
    );

    Router::new()
        .nest("/briefs", briefs_routes)
        .nest("/brief-responses", brief_responses_routes)
        .nest("/work-orders", work_orders_routes)
        .nest("/applications", applications_routes)
        .nest("/users", users_routes)
        .nest("/suppliers", suppliers_routes)
        .route("/frameworks", get(frameworks::list_frameworks))
        .route("/audit-events", get(audit::list_audit_events))
        .route("/_health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub(crate) fn to_iso(timestamp: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(timestamp, Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Pagination links in the `{"self": ..., "prev": ..., "next": ...}` shape
/// the listing endpoints share. `page` is 1-based.
pub(crate) fn pagination_links(base_url: &str, path: &str, page: i64, total: i64, per_page: i64) -> Value {
    let last_page = if total == 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    };

    let mut links = json!({
        "self": format!("{base_url}{path}?page={page}"),
        "last": format!("{base_url}{path}?page={last_page}"),
    });
    if page > 1 {
        links["prev"] = json!(format!("{base_url}{path}?page={}", page - 1));
    }
    if page < last_page {
        links["next"] = json!(format!("{base_url}{path}?page={}", page + 1));
    }
    links
}

#[cfg(test)]
mod tests {
    use super::pagination_links;
    use serde_json::json;

    #[test]
    fn first_page_has_no_prev_link() {
        let links = pagination_links("http://localhost", "/briefs", 1, 7, 5);
        assert_eq!(links["self"], json!("http://localhost/briefs?page=1"));
        assert_eq!(links["next"], json!("http://localhost/briefs?page=2"));
        assert_eq!(links["last"], json!("http://localhost/briefs?page=2"));
        assert!(links.get("prev").is_none());
    }

    #[test]
    fn last_page_has_no_next_link() {
        let links = pagination_links("http://localhost", "/briefs", 2, 7, 5);
        assert_eq!(links["prev"], json!("http://localhost/briefs?page=1"));
        assert!(links.get("next").is_none());
    }

    #[test]
    fn empty_listing_is_one_page() {
        let links = pagination_links("http://localhost", "/briefs", 1, 0, 5);
        assert!(links.get("next").is_none());
        assert!(links.get("prev").is_none());
    }
}
