//! Online orders and the WhatsApp webhook.
//!
//! ## Webhook
//! ```text
//! POST /api/whatsapp/webhook   (application/x-www-form-urlencoded)
//!   From=whatsapp:+51987654321  To=whatsapp:+51900111222  Body=hola
//!        │
//!        ├─ To → channel → TenantScope      (unknown number: empty reply)
//!        └─ WhatsAppRepository::handle_message(From, Body)
//!                │
//!                ▼
//!   <Response><Message>...</Message></Response>
//! ```

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::{error, warn};

use super::{clamp_limit, ok, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::auth::AuthUser;
use crate::AppState;
use tambo_core::{Order, OrderStatus, TenantScope, WhatsAppChannel};
use tambo_db::OrderDetail;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", post(advance))
        .route("/whatsapp/channels", get(list_channels).post(create_channel))
        .route("/whatsapp/webhook", post(webhook))
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
}

async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> ApiResult<Vec<Order>> {
    ok(state
        .db
        .scoped(&auth.scope)
        .orders()
        .list(query.status, clamp_limit(query.limit))
        .await?)
}

async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<OrderDetail> {
    ok(state.db.scoped(&auth.scope).orders().get(&id).await?)
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

async fn advance(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Order> {
    ok(state.db.scoped(&auth.scope).orders().advance(&id, req.status).await?)
}

async fn list_channels(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<WhatsAppChannel>> {
    ok(state.db.scoped(&auth.scope).whatsapp().list_channels().await?)
}

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    pub phone_number: String,
}

async fn create_channel(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ChannelRequest>,
) -> ApiResult<WhatsAppChannel> {
    auth.require_admin()?;
    ok(state
        .db
        .scoped(&auth.scope)
        .whatsapp()
        .create_channel(&req.phone_number)
        .await?)
}

// =============================================================================
// Webhook
// =============================================================================

/// Fields of the provider's form post.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

const FALLBACK_REPLY: &str = "Lo sentimos, no pudimos procesar tu mensaje. Inténtalo nuevamente.";

/// Unauthenticated; the business number in `To` selects the tenant.
async fn webhook(State(state): State<AppState>, Form(msg): Form<IncomingMessage>) -> Response {
    let channel = match state.db.whatsapp_channel_for(&msg.to).await {
        Ok(Some(channel)) => channel,
        Ok(None) => {
            warn!(to = %msg.to, "Message for an unknown WhatsApp number");
            return twiml(None);
        }
        Err(e) => {
            warn!(to = %msg.to, error = %e, "Cannot resolve WhatsApp number");
            return twiml(None);
        }
    };

    let scope = TenantScope::new(channel.company_id, channel.branch_id);
    match state
        .db
        .scoped(&scope)
        .whatsapp()
        .handle_message(&msg.from, &msg.body)
        .await
    {
        Ok(reply) => twiml(Some(&reply)),
        Err(e) => {
            error!(from = %msg.from, error = %e, "WhatsApp message failed");
            twiml(Some(FALLBACK_REPLY))
        }
    }
}

fn twiml(message: Option<&str>) -> Response {
    let body = match message {
        Some(text) => format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
            escape_xml(text)
        ),
        None => "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response/>".to_string(),
    };
    ([(CONTENT_TYPE, "application/xml; charset=utf-8")], body).into_response()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("Lomo & <Inca>"), "Lomo &amp; &lt;Inca&gt;");
        assert_eq!(escape_xml("S/ 35.00"), "S/ 35.00");
    }
}
