//! `/api/auth` route group: account registration and login (public) plus
//! face template enrollment (students only).

use crate::auth::guards::allow_student;
use crate::state::AppState;
use axum::{Router, middleware::from_fn, routing::post};

pub mod delete;
pub mod post;

pub fn auth_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(post::register))
        .route("/login", post(post::login));

    let face = Router::new()
        .route("/test-face-quality", post(post::test_face_quality))
        .route(
            "/register-face",
            post(post::register_face).delete(delete::unregister_face),
        )
        .route_layer(from_fn(allow_student));

    public.merge(face)
}
