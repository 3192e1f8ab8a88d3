//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LocalPhotoStore, MailgunEmailAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler, update_preferences_handler},
        comparison::{export_handler, get_comparison_handler},
        middleware::require_auth,
        projects::{
            create_criteria_handler, create_invitation_handler, create_project_handler,
            finish_project_handler, get_project_handler, list_criteria_handler,
            list_invitations_handler, list_projects_handler, redeem_invitation_handler,
            reorder_criteria_handler,
        },
        rest::ApiDoc,
        state::AppState,
        visits::{
            create_visit_handler, get_visit_handler, list_photos_handler, list_visits_handler,
            update_visit_handler, upload_photo_handler, upsert_assessments_handler,
        },
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let email_adapter = Arc::new(MailgunEmailAdapter::new(
        config.mailgun_api_key.clone(),
        config.mailgun_domain.clone(),
        config.default_from_email.clone(),
    ));
    let photo_store = Arc::new(LocalPhotoStore::new(config.media_root.clone()));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        email: email_adapter,
        photos: photo_store,
    });

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me/preferences", patch(update_preferences_handler))
        .route(
            "/projects",
            post(create_project_handler).get(list_projects_handler),
        )
        .route("/projects/{id}", get(get_project_handler))
        .route("/projects/{id}/finish", post(finish_project_handler))
        .route(
            "/projects/{id}/criteria",
            post(create_criteria_handler).get(list_criteria_handler),
        )
        .route("/projects/{id}/criteria/order", put(reorder_criteria_handler))
        .route(
            "/projects/{id}/invitations",
            post(create_invitation_handler).get(list_invitations_handler),
        )
        .route("/invitations/{token}/redeem", post(redeem_invitation_handler))
        .route(
            "/projects/{id}/visits",
            post(create_visit_handler).get(list_visits_handler),
        )
        .route(
            "/visits/{id}",
            get(get_visit_handler).put(update_visit_handler),
        )
        .route("/visits/{id}/assessments", put(upsert_assessments_handler))
        .route(
            "/visits/{id}/photos",
            post(upload_photo_handler).get(list_photos_handler),
        )
        .route("/projects/{id}/comparison", get(get_comparison_handler))
        .route("/projects/{id}/export", get(export_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes. The body limit covers photo uploads.
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
