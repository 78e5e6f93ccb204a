pub mod auth;
pub mod catalog;
pub mod coursework;
pub mod enrollments;
pub mod materials;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod session_cache;
pub mod state;
pub mod users;

pub use middleware::require_auth;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::web::state::AppState;

/// Builds every route of the service. Everything under `/api` requires a session.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/healthz", get(rest::health_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/session", post(auth::session_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/api/me/profile",
            get(users::get_profile_handler).put(users::update_profile_handler),
        )
        .route("/api/users", get(users::list_users_handler))
        .route("/api/users/{id}", delete(users::delete_user_handler))
        .route("/api/users/{id}/role", put(users::set_role_handler))
        .route("/api/users/{id}/approve", put(users::approve_user_handler))
        .route("/api/users/{id}/reject", put(users::reject_user_handler))
        .route(
            "/api/courses",
            get(catalog::list_courses_handler).post(catalog::create_course_handler),
        )
        .route("/api/courses/{id}/roster", get(catalog::course_roster_handler))
        .route(
            "/api/courses/{id}/students/{student_id}/average",
            get(catalog::course_average_handler),
        )
        .route(
            "/api/groups",
            get(catalog::list_groups_handler).post(catalog::create_group_handler),
        )
        .route("/api/groups/{id}", put(catalog::update_group_handler))
        .route("/api/groups/{id}/roster", get(catalog::group_roster_handler))
        .route("/api/teachers", get(catalog::list_teachers_handler))
        .route(
            "/api/enrollments",
            get(enrollments::list_enrollments_handler).post(enrollments::enroll_handler),
        )
        .route(
            "/api/enrollments/{id}",
            delete(enrollments::withdraw_handler),
        )
        .route(
            "/api/tasks",
            get(coursework::list_tasks_handler).post(coursework::create_task_handler),
        )
        .route(
            "/api/tasks/{id}",
            put(coursework::update_task_handler).delete(coursework::delete_task_handler),
        )
        .route(
            "/api/tasks/{id}/submissions",
            get(coursework::task_submissions_handler).post(coursework::submit_handler),
        )
        .route("/api/tasks/{id}/my-submission", get(coursework::my_submission_handler))
        .route("/api/submissions/{id}/grade", put(coursework::grade_handler))
        .route(
            "/api/materials",
            get(materials::list_materials_handler).post(materials::create_material_handler),
        )
        .route(
            "/api/materials/{id}",
            put(materials::update_material_handler).delete(materials::delete_material_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
