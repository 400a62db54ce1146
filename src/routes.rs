// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, catalog, commerce, materials, profile, reviews},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware},
};

/// Assembles the main application router.
///
/// * Public catalog and auth routes.
/// * Routes that read the caller when a token is present (material detail).
/// * Routes that require a valid token (cart, checkout, orders, selling).
/// * Admin routes behind auth and the admin role check.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/home", get(catalog::home))
        .route("/api/materials", get(catalog::browse))
        .route("/api/search", get(catalog::search))
        .route("/api/categories", get(catalog::list_categories))
        .route("/api/categories/{slug}", get(catalog::category_materials))
        .route("/api/universities", get(catalog::list_universities))
        .route("/api/materials/{id}/reviews", get(reviews::list_reviews))
        .route("/api/materials/{id}/preview", get(catalog::preview))
        .route("/api/sellers/{id}", get(catalog::seller_profile));

    let viewer_routes = Router::new()
        .route("/api/materials/{id}", get(catalog::material_detail))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let protected_routes = Router::new()
        .route(
            "/api/materials",
            post(materials::create_material)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .route(
            "/api/materials/{id}",
            put(materials::update_material).delete(materials::delete_material),
        )
        .route("/api/materials/{id}/reviews", post(reviews::create_review))
        .route("/api/materials/{id}/download", get(commerce::download))
        .route("/api/reviews/{id}", put(reviews::update_review))
        .route("/api/reviews/{id}/helpful", post(reviews::mark_helpful))
        .route("/api/cart", get(commerce::get_cart))
        .route("/api/cart/count", get(commerce::cart_count))
        .route(
            "/api/cart/{material_id}",
            post(commerce::add_to_cart).delete(commerce::remove_from_cart),
        )
        .route("/api/checkout", post(commerce::checkout))
        .route("/api/orders", get(commerce::list_orders))
        .route("/api/orders/{id}", get(commerce::get_order))
        .route("/api/favorites", get(profile::list_my_favorites))
        .route("/api/favorites/{material_id}", post(profile::toggle_favorite))
        .route("/api/me", get(profile::get_me).put(profile::update_me))
        .route("/api/me/materials", get(profile::list_my_materials))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/categories", post(admin::create_category))
        .route("/universities", post(admin::create_university))
        .route("/materials/{id}/flags", put(admin::set_material_flags))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(protected_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
