//! # Tambo API
//!
//! JSON HTTP server for the Tambo ERP web frontend, plus the WhatsApp
//! webhook.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           API Server                                    │
//! │                                                                         │
//! │  Browser / WhatsApp provider                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌────────────────┐  TraceLayer, CorsLayer                              │
//! │  │  axum Router   │                                                     │
//! │  │   /api/*       │                                                     │
//! │  └───────┬────────┘                                                     │
//! │          │  AuthUser (JWT) → TenantScope                                │
//! │          ▼                                                              │
//! │  ┌────────────────┐   ┌──────────────────────────────────────────────┐ │
//! │  │ routes::*      │──►│ tambo-db  db.scoped(&scope).sales()...       │ │
//! │  └────────────────┘   └──────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::ApiConfig`]. Environment variables:
//! - `TAMBO_PORT` - HTTP port (default: 8080)
//! - `TAMBO_DATABASE_PATH` - SQLite file (default: tambo.db)
//! - `TAMBO_JWT_SECRET` - Secret for JWT signing
//! - `TAMBO_JWT_ACCESS_LIFETIME_SECS` - Token lifetime (default: 43200)
//! - `TAMBO_MINIMUM_WAGE_CENTS` - RMV used by payroll

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use tambo_core::payroll::PayrollRules;
use tambo_db::Database;

// Re-exports
pub use auth::{AuthUser, JwtManager};
pub use config::ApiConfig;
pub use error::ApiError;

/// Shared application state.
///
/// Cheap to clone; handlers receive it through `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub rules: PayrollRules,
}

impl AppState {
    pub fn new(db: Database, config: &ApiConfig) -> Self {
        AppState {
            db,
            jwt: Arc::new(JwtManager::new(&config.jwt_secret, config.jwt_access_lifetime_secs)),
            rules: config.payroll_rules(),
        }
    }
}

/// Builds the complete router, ready to serve.
pub fn build_router(state: AppState, cors_origin: Option<&str>) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .with_state(state)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            warn!("Invalid CORS origin configured, allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}
