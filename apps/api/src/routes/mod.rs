//! Route handlers, one module per business area.
//!
//! Handlers stay thin: extract the caller and the payload, call one
//! repository method on `db.scoped(&auth.scope)`, wrap the result.

use axum::extract::{FromRequest, FromRequestParts};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub mod accounts;
pub mod auth;
pub mod cash;
pub mod company;
pub mod inventory;
pub mod ledger;
pub mod orders;
pub mod payroll;
pub mod sales;
pub mod tables;

/// Every route under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(company::router())
        .merge(inventory::router())
        .merge(tables::router())
        .merge(cash::router())
        .merge(sales::router())
        .merge(accounts::router())
        .merge(ledger::router())
        .merge(payroll::router())
        .merge(orders::router())
}

// =============================================================================
// Envelope & Extractors
// =============================================================================

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        success: true,
        data,
    }))
}

/// `Json` whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

/// `?limit=` of list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

impl LimitQuery {
    pub fn limit(&self) -> u32 {
        clamp_limit(self.limit)
    }
}

pub(crate) fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
    }
}
