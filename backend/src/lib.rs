use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;

use state::AppState;

/// Builds the full HTTP surface: session endpoints, admin account
/// management, the event notice publisher and the realtime hub.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh-token", post(handlers::auth::refresh_token));

    let user_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/auth/change-password",
            post(handlers::auth::change_password),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/auth/approve-organizer/{id}",
            post(handlers::admin::approve_organizer),
        )
        .route(
            "/api/auth/pending-organizers",
            get(handlers::admin::pending_organizers),
        )
        .route("/api/auth/create-user", post(handlers::admin::create_user))
        .route(
            "/api/auth/delete-user/{id}",
            delete(handlers::admin::delete_user),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_admin,
        ));

    let publisher_routes = Router::new()
        .route(
            "/api/events/{event_id}/notifications",
            post(handlers::events::publish_notice),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_publisher,
        ));

    let hub_routes = Router::new()
        .route("/hubs/events", get(hub::socket::event_hub_socket))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_hub,
        ));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(publisher_routes)
        .merge(hub_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
