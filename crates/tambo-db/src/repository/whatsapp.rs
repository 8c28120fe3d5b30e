//! # WhatsApp Repository
//!
//! Business numbers (channels) and per-customer conversations.
//!
//! ## Message Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  webhook (From, To, Body)                                               │
//! │       │  To → channel → TenantScope                                     │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │   load conversation (branch, From)  ──none──► Conversation::default()   │
//! │   menu = active products (name order)                                   │
//! │   whatsapp::handle(conv, Body, menu)                                    │
//! │     ├─ ReportStatus → status of the latest order                        │
//! │     └─ PlaceOrder   → orders + order_items                              │
//! │   upsert conversation                                                   │
//! │  COMMIT → reply text                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use tambo_core::validation::normalize_phone;
use tambo_core::whatsapp::{handle, status_reply, Conversation, Effect, MenuItem};
use tambo_core::{TenantScope, WhatsAppChannel};

const CHANNEL_COLUMNS: &str = "id, company_id, branch_id, phone_number, is_active, created_at";

#[derive(Debug, Clone)]
pub struct WhatsAppRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl WhatsAppRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        WhatsAppRepository { pool, scope }
    }

    pub async fn list_channels(&self) -> DbResult<Vec<WhatsAppChannel>> {
        let channels = sqlx::query_as::<_, WhatsAppChannel>(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM whatsapp_channels WHERE company_id = ?1 ORDER BY created_at"
        ))
        .bind(&self.scope.company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(channels)
    }

    /// Links a business number to the current branch.
    pub async fn create_channel(&self, phone_number: &str) -> DbResult<WhatsAppChannel> {
        let channel = WhatsAppChannel {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            phone_number: normalize_phone(phone_number)?,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(&format!(
            "INSERT INTO whatsapp_channels ({CHANNEL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ))
        .bind(&channel.id)
        .bind(&channel.company_id)
        .bind(&channel.branch_id)
        .bind(&channel.phone_number)
        .bind(channel.is_active)
        .bind(channel.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("phone_number", &channel.phone_number)
            }
            other => other,
        })?;

        info!(phone = %channel.phone_number, "WhatsApp channel created");
        Ok(channel)
    }

    /// The active channel owning `phone_number`, across all companies.
    pub async fn channel_for_number(
        pool: &SqlitePool,
        phone_number: &str,
    ) -> DbResult<Option<WhatsAppChannel>> {
        let phone = normalize_phone(phone_number)?;

        let channel = sqlx::query_as::<_, WhatsAppChannel>(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM whatsapp_channels WHERE phone_number = ?1 AND is_active = 1"
        ))
        .bind(&phone)
        .fetch_optional(pool)
        .await?;

        Ok(channel)
    }

    /// Runs one incoming message through the conversation and returns the reply.
    pub async fn handle_message(&self, from: &str, body: &str) -> DbResult<String> {
        let phone = normalize_phone(from)?;
        let mut tx = self.pool.begin().await?;

        let conversation = self.load_conversation(&mut tx, &phone).await?;
        let menu: Vec<MenuItem> = super::product::menu(&mut tx, &self.scope.company_id)
            .await?
            .into_iter()
            .map(|p| MenuItem {
                price: p.price(),
                product_id: p.id,
                name: p.name,
            })
            .collect();

        let transition = handle(&conversation, body, &menu);
        let mut reply = transition.reply;

        match transition.effect {
            Effect::None => {}
            Effect::ReportStatus => {
                let latest = super::order::latest_for_phone(&mut tx, &self.scope, &phone).await?;
                reply = status_reply(
                    latest
                        .as_ref()
                        .map(|o| (order_reference(&o.id), o.status)),
                );
            }
            Effect::PlaceOrder(draft) => {
                let order =
                    super::order::create_from_draft(&mut tx, &self.scope, &phone, &draft).await?;
                reply = format!("{}\nTu número de pedido es {}.", reply, order_reference(&order.id));
            }
        }

        self.save_conversation(&mut tx, &phone, &transition.next).await?;
        tx.commit().await?;

        debug!(phone = %phone, state = ?transition.next.state, "WhatsApp message handled");
        Ok(reply)
    }

    async fn load_conversation(
        &self,
        conn: &mut SqliteConnection,
        phone: &str,
    ) -> DbResult<Conversation> {
        let data: Option<String> = sqlx::query_scalar(
            "SELECT data FROM whatsapp_conversations WHERE branch_id = ?1 AND customer_phone = ?2",
        )
        .bind(&self.scope.branch_id)
        .bind(phone)
        .fetch_optional(&mut *conn)
        .await?;

        match data {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| DbError::Internal(format!("corrupt conversation state: {}", e))),
            None => Ok(Conversation::default()),
        }
    }

    async fn save_conversation(
        &self,
        conn: &mut SqliteConnection,
        phone: &str,
        conversation: &Conversation,
    ) -> DbResult<()> {
        let data = serde_json::to_string(conversation)
            .map_err(|e| DbError::Internal(format!("cannot encode conversation: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO whatsapp_conversations (id, company_id, branch_id, customer_phone, state, data, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (branch_id, customer_phone) DO UPDATE SET
                state = excluded.state,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(new_id())
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .bind(phone)
        .bind(conversation.state)
        .bind(data)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/// Short reference a customer can quote: the first block of the id.
fn order_reference(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;
    use tambo_core::whatsapp::ConversationState;
    use tambo_core::OrderStatus;

    const CUSTOMER: &str = "whatsapp:+51987654321";

    async fn stored(wa: &WhatsAppRepository) -> Conversation {
        let mut conn = wa.pool.acquire().await.unwrap();
        wa.load_conversation(&mut conn, "+51987654321").await.unwrap()
    }

    #[tokio::test]
    async fn test_channel_resolves_tenant() {
        let fx = fixture().await;
        let wa = fx.db.scoped(&fx.scope).whatsapp();
        wa.create_channel("whatsapp:+51 900-111-222").await.unwrap();

        let found = fx.db.whatsapp_channel_for("+51900111222").await.unwrap().unwrap();
        assert_eq!(found.company_id, fx.scope.company_id);
        assert!(fx.db.whatsapp_channel_for("+51900000000").await.unwrap().is_none());

        assert!(wa.create_channel("+51900111222").await.unwrap_err().is_unique_violation());
    }

    #[tokio::test]
    async fn test_numbers_match_with_or_without_plus() {
        let fx = fixture().await;
        let wa = fx.db.scoped(&fx.scope).whatsapp();
        let channel = wa.create_channel("51900111222").await.unwrap();
        assert_eq!(channel.phone_number, "+51900111222");

        let found = fx.db.whatsapp_channel_for("whatsapp:+51900111222").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(channel.id));

        wa.handle_message("whatsapp:+51987654321", "hola").await.unwrap();
        wa.handle_message("51987654321", "1").await.unwrap();
        wa.handle_message("987654321", "1").await.unwrap();

        let conv = stored(&wa).await;
        assert_eq!(conv.cart.len(), 1);
        assert_eq!(conv.cart[0].quantity, 2);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM whatsapp_conversations")
            .fetch_one(fx.db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_happy_path_places_order() {
        let fx = fixture().await;
        let wa = fx.db.scoped(&fx.scope).whatsapp();

        // Menu by name: 1 Cusqueña, 2 Inca Kola, 3 Lomo saltado
        let menu = wa.handle_message(CUSTOMER, "hola").await.unwrap();
        assert!(menu.contains("Inca Kola"));

        wa.handle_message(CUSTOMER, "3 x2").await.unwrap();
        wa.handle_message(CUSTOMER, "listo").await.unwrap();
        wa.handle_message(CUSTOMER, "2").await.unwrap(); // pickup
        wa.handle_message(CUSTOMER, "1").await.unwrap(); // cash
        let reply = wa.handle_message(CUSTOMER, "Sí").await.unwrap();
        assert!(reply.contains("Tu número de pedido es"));

        let orders = fx.db.scoped(&fx.scope).orders().list(None, 10).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total_cents, 7_000);
        assert_eq!(orders[0].customer_phone, "+51987654321");

        let status = wa.handle_message(CUSTOMER, "estado").await.unwrap();
        assert!(status.contains(OrderStatus::Received.label_es()));
    }

    #[tokio::test]
    async fn test_invalid_input_keeps_state_and_cancel_resets() {
        let fx = fixture().await;
        let wa = fx.db.scoped(&fx.scope).whatsapp();

        wa.handle_message(CUSTOMER, "hola").await.unwrap();
        wa.handle_message(CUSTOMER, "1").await.unwrap();
        wa.handle_message(CUSTOMER, "listo").await.unwrap();
        wa.handle_message(CUSTOMER, "9").await.unwrap();

        let conv = stored(&wa).await;
        assert_eq!(conv.state, ConversationState::ChoosingFulfillment);
        assert_eq!(conv.cart.len(), 1);

        wa.handle_message(CUSTOMER, "cancelar").await.unwrap();
        assert_eq!(stored(&wa).await, Conversation::default());
    }
}
