//! Backend of the PawCare pet-care website.
//!
//! The service is a thin HTTP layer. Every record, login and stored file lives on a hosted
//! platform (PostgREST database, GoTrue identity, object storage) reached through the
//! [`platform`] crate; this crate validates input, decides who may do what, and shapes the
//! responses the site's frontend expects.
//!
//! # Areas
//! - Public: contact form, newsbar, prices, Google reviews, onboarding token checks
//! - Admin CRM: customers, leads, bookings, capacity, custom properties
//! - Customer portal: profile, pets, documents
//!
//! # Sessions
//! Logins set `sb-access-token` / `sb-refresh-token` cookies. Requests are authenticated by the
//! first token found among the platform's own session cookie, an `Authorization: Bearer`
//! header, and the plain access cookie. See [`auth`].
//!
//! # Multi-step writes
//! Writes spanning several rows (prices, newsbar, lead conversion, onboarding) record what they
//! changed in a [`store::Journal`] and undo it if a later step fails.
//!
//! # Setup
//!
//! ```sh
//! PLATFORM_URL=https://abc.supabase.co \
//! PLATFORM_ANON_KEY=... PLATFORM_SERVICE_KEY=... \
//! RUST_LOG=info cargo run -p pawcare
//! ```
//!
//! View docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, patch, post, put},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod contact;
pub mod error;
pub mod mail;
pub mod models;
pub mod onboarding;
pub mod properties;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use config::{Config, ConfigError};
use error::AppError;
use routes::{
    auth as session, bookings, capacity, contact as contact_form, customers, documents, health,
    leads, newsbar, onboarding as invites, portal, prices, properties as custom_fields,
    reviews as google_reviews,
};
use state::State;

fn cors(config: &Config) -> Result<CorsLayer, AppError> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));

    let Some(origin) = &config.cors_origin else {
        return Ok(layer);
    };

    let origin = HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
        key: "CORS_ORIGIN",
        reason: e.to_string(),
    })?;

    Ok(layer.allow_origin(origin))
}

pub fn build_router(state: Arc<State>) -> Result<Router, AppError> {
    let auth = Router::new()
        .route("/login", post(session::login))
        .route("/register", post(session::register))
        .route("/logout", post(session::logout))
        .route("/me", get(session::me));

    let admin = Router::new()
        .route("/newsbar", get(newsbar::admin).put(newsbar::update))
        .route("/prices", put(prices::update))
        .route("/customers", get(customers::list).post(customers::create))
        .route(
            "/customers/{id}",
            patch(customers::update_cell).delete(customers::delete),
        )
        .route("/customers/{id}/invite", post(customers::invite))
        .route("/leads", get(leads::list))
        .route("/leads/{id}", patch(leads::update_cell).delete(leads::delete))
        .route("/leads/{id}/convert", post(leads::convert))
        .route("/bookings", get(bookings::list))
        .route("/bookings/{id}", patch(bookings::respond))
        .route("/capacity", get(capacity::list).put(capacity::update))
        .route(
            "/properties",
            get(custom_fields::list).post(custom_fields::create),
        )
        .route(
            "/properties/{id}",
            patch(custom_fields::update).delete(custom_fields::delete),
        );

    let customer_portal = Router::new()
        .route(
            "/profile",
            get(portal::profile).put(portal::update_profile),
        )
        .route("/pets", get(portal::pets).post(portal::add_pet))
        .route(
            "/pets/{id}",
            put(portal::update_pet).delete(portal::delete_pet),
        )
        .route(
            "/documents",
            get(documents::list)
                .post(documents::upload)
                .layer(DefaultBodyLimit::max(documents::MAX_UPLOAD_BYTES + 1024 * 1024)),
        )
        .route("/documents/{id}", delete(documents::delete))
        .route("/documents/{id}/download", get(documents::download));

    let api = Router::new()
        .nest("/auth", auth)
        .nest("/admin", admin)
        .nest("/portal", customer_portal)
        .route("/contact", post(contact_form::submit))
        .route("/newsbar", get(newsbar::public))
        .route("/prices", get(prices::list))
        .route("/onboarding/verify", post(invites::verify))
        .route(
            "/reviews/google",
            get(google_reviews::google).post(google_reviews::refresh),
        );

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.config)?)
        .with_state(state);

    Ok(app)
}

pub async fn start_server() -> Result<(), AppError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    if config.cors_origin.is_none() {
        warn!("CORS_ORIGIN not set, cross-origin requests will be refused");
    }

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state)?;

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
