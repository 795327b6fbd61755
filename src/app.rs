use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{enforce, Guarded};
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{auth, cart, categories, health, orders, products, reviews, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
        }
    }
}

/// Route layer that authenticates the caller and applies `$policy`
macro_rules! guard {
    ($state:expr, $policy:expr) => {
        axum::middleware::from_fn_with_state(Guarded::new($state, $policy), enforce)
    };
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    Ok(build_router(AppState::new(pool, jwt_config)))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/abilities", get(auth::abilities))
        .route("/logout", post(auth::logout));

    let user_routes = Router::new()
        .route("/", get(users::list_users).route_layer(guard!(&state, users::READ_USERS)))
        .route("/:id", get(users::get_user))
        .route("/:id/password", post(users::change_password))
        .route("/:id", patch(users::update_user).route_layer(guard!(&state, users::UPDATE_USERS)))
        .route("/:id", delete(users::delete_user).route_layer(guard!(&state, users::DELETE_USERS)));

    let product_routes = Router::new()
        .route("/", get(products::list_products).route_layer(guard!(&state, products::READ_PRODUCTS)))
        .route("/", post(products::create_product).route_layer(guard!(&state, products::CATALOG_STAFF)))
        .route("/:id", get(products::get_product).route_layer(guard!(&state, products::READ_PRODUCTS)))
        .route("/:id", patch(products::update_product).route_layer(guard!(&state, products::CATALOG_STAFF)))
        .route("/:id", delete(products::delete_product).route_layer(guard!(&state, products::DELETE_PRODUCTS)));

    // Listing and detail are public
    let category_routes = Router::new()
        .route("/", get(categories::list_categories))
        .route("/", post(categories::create_category).route_layer(guard!(&state, categories::CATEGORY_STAFF)))
        .route("/:id", get(categories::get_category))
        .route("/:id", patch(categories::update_category).route_layer(guard!(&state, categories::CATEGORY_STAFF)))
        .route("/:id", delete(categories::delete_category).route_layer(guard!(&state, categories::CATEGORY_STAFF)));

    let review_routes = Router::new()
        .route("/", get(reviews::list_reviews).route_layer(guard!(&state, reviews::ADMIN_ONLY)))
        .route("/", post(reviews::create_review).route_layer(guard!(&state, reviews::CREATE_REVIEWS)))
        .route("/:id", get(reviews::get_review).route_layer(guard!(&state, reviews::READ_REVIEWS)))
        .route("/:id", patch(reviews::update_review).route_layer(guard!(&state, reviews::UPDATE_REVIEWS)))
        .route("/:id", delete(reviews::delete_review).route_layer(guard!(&state, reviews::DELETE_REVIEWS)));

    // GET /orders/:id authenticates through the AuthUser extractor; owners
    // are checked in the handler
    let order_routes = Router::new()
        .route("/", get(orders::list_orders).route_layer(guard!(&state, orders::ORDER_STAFF)))
        .route("/", post(orders::create_order).route_layer(guard!(&state, orders::CREATE_ORDERS)))
        .route("/:id", get(orders::get_order))
        .route("/:id", patch(orders::update_order).route_layer(guard!(&state, orders::ORDER_STAFF)))
        .route("/:id", delete(orders::delete_order).route_layer(guard!(&state, orders::DELETE_ORDERS)));

    // Everything but the listing is checked against the cart owner in the handler
    let cart_routes = Router::new()
        .route("/", get(cart::list_carts).route_layer(guard!(&state, cart::CART_STAFF)))
        .route("/", post(cart::create_cart))
        .route("/:id", get(cart::get_cart).patch(cart::update_cart).delete(cart::delete_cart));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/products", product_routes)
        .nest("/categories", category_routes)
        .nest("/cart", cart_routes)
        .nest("/reviews", review_routes)
        .nest("/orders", order_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
