//! # WhatsApp Module
//!
//! Conversational ordering over WhatsApp. A customer writes plain text; each
//! message moves a small state machine that builds a cart and, once
//! confirmed, asks the database layer to place the order.
//!
//! ## Conversation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Idle ──any text──► Browsing ──"listo"──► ChoosingFulfillment          │
//! │                      ▲   │ "N", "N Q", "N xQ"       │                   │
//! │                      │   └──(adds to cart)          │ 1 delivery        │
//! │                      │                              ▼                   │
//! │                      │                        AskingAddress             │
//! │                      │             2 pickup         │ address           │
//! │                      │    ┌─────────────────────────┤                   │
//! │                      │    ▼                         ▼                   │
//! │                      │  ChoosingPayment ──1-4──► Confirming             │
//! │                      │                              │                   │
//! │                      └───────────"no"───────────────┤ "si"              │
//! │                                                     ▼                   │
//! │                                          PlaceOrder effect → Idle       │
//! │                                                                         │
//! │  Anywhere: "cancelar" (empty cart, Idle), "menu", "ayuda", "estado"    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`handle`] is pure: it never fails, and invalid input leaves the state
//! unchanged with a reply listing what is expected.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::sale::PaymentMethod;
use crate::types::{Fulfillment, OrderStatus};
use crate::{MAX_LINES, MAX_LINE_QUANTITY};

/// Minimum length of a delivery address.
pub const MIN_ADDRESS_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Browsing,
    ChoosingFulfillment,
    AskingAddress,
    ChoosingPayment,
    Confirming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl CartLine {
    pub fn total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Everything remembered between two messages of the same customer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Conversation {
    pub state: ConversationState,
    pub cart: Vec<CartLine>,
    pub fulfillment: Option<Fulfillment>,
    pub address: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    /// Product ids in the order the last menu listed them; item numbers
    /// typed by the customer refer to this list.
    #[serde(default)]
    pub menu: Vec<String>,
}

impl Conversation {
    pub fn cart_total(&self) -> Money {
        self.cart.iter().map(CartLine::total).sum()
    }

    fn in_state(&self, state: ConversationState) -> Conversation {
        Conversation {
            state,
            ..self.clone()
        }
    }
}

/// A product offered in the chat, numbered by its position (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub product_id: String,
    pub name: String,
    pub price: Money,
}

/// The order to create once the customer confirms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub lines: Vec<CartLine>,
    pub fulfillment: Fulfillment,
    pub address: Option<String>,
    pub payment_method: PaymentMethod,
    pub total: Money,
}

/// Side effect the caller must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    PlaceOrder(OrderDraft),
    /// Reply with the status of the customer's latest order.
    ReportStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Conversation,
    pub reply: String,
    pub effect: Effect,
}

impl Transition {
    fn stay(conv: &Conversation, reply: impl Into<String>) -> Self {
        Transition {
            next: conv.clone(),
            reply: reply.into(),
            effect: Effect::None,
        }
    }

    fn to(next: Conversation, reply: impl Into<String>) -> Self {
        Transition {
            next,
            reply: reply.into(),
            effect: Effect::None,
        }
    }
}

// =============================================================================
// Replies
// =============================================================================

const HELP: &str = "Comandos: *menu* para ver la carta, *estado* para ver tu último pedido, \
*cancelar* para empezar de nuevo.";

const FULFILLMENT_PROMPT: &str = "¿Cómo quieres recibirlo?\n1. Delivery\n2. Recojo en tienda";

const PAYMENT_PROMPT: &str = "¿Cómo pagarás?\n1. Efectivo\n2. Yape\n3. Plin\n4. Tarjeta";

/// Numbered menu text.
pub fn format_menu(menu: &[MenuItem]) -> String {
    let mut text = String::from("*Nuestra carta*\n");
    for (i, item) in menu.iter().enumerate() {
        text.push_str(&format!("{}. {} - {}\n", i + 1, item.name, item.price));
    }
    text.push_str("Escribe el número del plato y la cantidad (ej. *2 x3*). Escribe *listo* al terminar.");
    text
}

fn format_cart(conv: &Conversation) -> String {
    let mut text = String::new();
    for line in &conv.cart {
        text.push_str(&format!("{} x {} - {}\n", line.quantity, line.name, line.total()));
    }
    text.push_str(&format!("Total: {}", conv.cart_total()));
    text
}

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "Efectivo",
        PaymentMethod::Yape => "Yape",
        PaymentMethod::Plin => "Plin",
        PaymentMethod::Card => "Tarjeta",
        PaymentMethod::Transfer => "Transferencia",
    }
}

fn summary(conv: &Conversation) -> String {
    let delivery = match (conv.fulfillment, conv.address.as_deref()) {
        (Some(Fulfillment::Delivery), Some(address)) => format!("Delivery a: {}", address),
        _ => "Recojo en tienda".to_string(),
    };
    let payment = conv.payment_method.map(payment_label).unwrap_or_default();

    format!(
        "*Resumen de tu pedido*\n{}\n{}\nPago: {}\n¿Confirmas? (si / no)",
        format_cart(conv),
        delivery,
        payment
    )
}

/// Reply to `estado`; `latest` is the customer's most recent order.
pub fn status_reply(latest: Option<(&str, OrderStatus)>) -> String {
    match latest {
        Some((reference, status)) => {
            format!("Tu pedido {} está {}.", reference, status.label_es())
        }
        None => "No tienes pedidos registrados.".to_string(),
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Lowercase, trimmed, without Spanish accents.
fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect()
}

/// Parses `N`, `N Q` or `N xQ` into (menu index, quantity).
fn parse_item(text: &str) -> Option<(usize, i64)> {
    let mut parts = text.split_whitespace();
    let number: usize = parts.next()?.parse().ok()?;

    let quantity = match (parts.next(), parts.next()) {
        (None, _) => 1,
        (Some("x"), Some(q)) => q.parse().ok()?,
        (Some(q), None) => q.strip_prefix('x').unwrap_or(q).parse().ok()?,
        _ => return None,
    };

    if parts.next().is_some() || number == 0 || !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return None;
    }

    Some((number - 1, quantity))
}

// =============================================================================
// State Machine
// =============================================================================

/// Advances `conv` with one incoming message.
pub fn handle(conv: &Conversation, input: &str, menu: &[MenuItem]) -> Transition {
    let text = normalize(input);

    match text.as_str() {
        "cancelar" => {
            return Transition::to(
                Conversation::default(),
                "Pedido cancelado. Escribe *menu* cuando quieras volver a pedir.",
            )
        }
        "menu" | "carta" => return show_menu(conv, menu),
        "ayuda" => return Transition::stay(conv, HELP),
        "estado" => {
            return Transition {
                next: conv.clone(),
                reply: status_reply(None),
                effect: Effect::ReportStatus,
            }
        }
        _ => {}
    }

    match conv.state {
        ConversationState::Idle => show_menu(conv, menu),
        ConversationState::Browsing => browse(conv, &text, menu),
        ConversationState::ChoosingFulfillment => match text.as_str() {
            "1" => Transition::to(
                Conversation {
                    state: ConversationState::AskingAddress,
                    fulfillment: Some(Fulfillment::Delivery),
                    ..conv.clone()
                },
                "Escribe tu dirección de entrega.",
            ),
            "2" => Transition::to(
                Conversation {
                    state: ConversationState::ChoosingPayment,
                    fulfillment: Some(Fulfillment::Pickup),
                    address: None,
                    ..conv.clone()
                },
                PAYMENT_PROMPT,
            ),
            _ => Transition::stay(conv, format!("Responde 1 o 2.\n{}", FULFILLMENT_PROMPT)),
        },
        ConversationState::AskingAddress => {
            let address = input.trim();
            if address.chars().count() < MIN_ADDRESS_LEN {
                return Transition::stay(
                    conv,
                    "La dirección es muy corta. Escribe calle, número y referencia.",
                );
            }
            Transition::to(
                Conversation {
                    state: ConversationState::ChoosingPayment,
                    address: Some(address.to_string()),
                    ..conv.clone()
                },
                PAYMENT_PROMPT,
            )
        }
        ConversationState::ChoosingPayment => {
            let method = match text.as_str() {
                "1" => PaymentMethod::Cash,
                "2" => PaymentMethod::Yape,
                "3" => PaymentMethod::Plin,
                "4" => PaymentMethod::Card,
                _ => {
                    return Transition::stay(
                        conv,
                        format!("Responde con un número del 1 al 4.\n{}", PAYMENT_PROMPT),
                    )
                }
            };
            let next = Conversation {
                state: ConversationState::Confirming,
                payment_method: Some(method),
                ..conv.clone()
            };
            let reply = summary(&next);
            Transition::to(next, reply)
        }
        ConversationState::Confirming => confirm(conv, &text),
    }
}

fn show_menu(conv: &Conversation, menu: &[MenuItem]) -> Transition {
    if menu.is_empty() {
        return Transition::to(
            conv.in_state(ConversationState::Idle),
            "Por ahora no tenemos platos disponibles. Inténtalo más tarde.",
        );
    }
    Transition::to(
        Conversation {
            state: ConversationState::Browsing,
            fulfillment: None,
            address: None,
            payment_method: None,
            cart: conv.cart.clone(),
            menu: menu.iter().map(|item| item.product_id.clone()).collect(),
        },
        format_menu(menu),
    )
}

fn browse(conv: &Conversation, text: &str, menu: &[MenuItem]) -> Transition {
    if text == "listo" {
        if conv.cart.is_empty() {
            return Transition::stay(
                conv,
                "Tu carrito está vacío. Escribe el número de un plato para agregarlo.",
            );
        }
        return Transition::to(
            conv.in_state(ConversationState::ChoosingFulfillment),
            format!("{}\n\n{}", format_cart(conv), FULFILLMENT_PROMPT),
        );
    }

    let Some((index, quantity)) = parse_item(text) else {
        return Transition::stay(
            conv,
            "No entendí. Escribe el número del plato y la cantidad (ej. *2 x3*), o *listo*.",
        );
    };

    let shown = if conv.menu.is_empty() {
        menu.len()
    } else {
        conv.menu.len()
    };
    if index >= shown {
        return Transition::stay(conv, format!("Elige un número del 1 al {}.", shown));
    }

    let item = match conv.menu.get(index) {
        Some(product_id) => menu.iter().find(|item| &item.product_id == product_id),
        None => menu.get(index),
    };
    let Some(item) = item else {
        return Transition::stay(
            conv,
            "Ese plato ya no está disponible. Escribe *menu* para ver la carta actualizada.",
        );
    };

    let mut next = conv.clone();
    let cart_full = next.cart.len() >= MAX_LINES;
    match next.cart.iter_mut().find(|l| l.product_id == item.product_id) {
        Some(line) if line.quantity + quantity > MAX_LINE_QUANTITY => {
            return Transition::stay(conv, "Cantidad demasiado grande.");
        }
        Some(line) => line.quantity += quantity,
        None if cart_full => {
            return Transition::stay(conv, "Tu carrito está lleno. Escribe *listo*.");
        }
        None => next.cart.push(CartLine {
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity,
        }),
    }

    let reply = format!(
        "Agregado: {} x {}.\n{}\nAgrega otro plato o escribe *listo*.",
        quantity,
        item.name,
        format_cart(&next)
    );
    Transition::to(next, reply)
}

fn confirm(conv: &Conversation, text: &str) -> Transition {
    match text {
        "si" => {
            let (Some(fulfillment), Some(payment_method)) =
                (conv.fulfillment, conv.payment_method)
            else {
                return Transition::to(
                    conv.in_state(ConversationState::ChoosingFulfillment),
                    FULFILLMENT_PROMPT,
                );
            };
            let draft = OrderDraft {
                lines: conv.cart.clone(),
                fulfillment,
                address: conv.address.clone(),
                payment_method,
                total: conv.cart_total(),
            };
            Transition {
                next: Conversation::default(),
                reply: "¡Pedido recibido! Te avisaremos cuando esté en camino.".to_string(),
                effect: Effect::PlaceOrder(draft),
            }
        }
        "no" => Transition::to(
            Conversation {
                state: ConversationState::Browsing,
                cart: conv.cart.clone(),
                menu: conv.menu.clone(),
                ..Conversation::default()
            },
            "Puedes seguir agregando platos. Escribe *listo* cuando termines.",
        ),
        _ => Transition::stay(conv, "Responde *si* para confirmar o *no* para modificar."),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn menu() -> Vec<MenuItem> {
        vec![
            MenuItem {
                product_id: "p-lomo".to_string(),
                name: "Lomo saltado".to_string(),
                price: Money::from_cents(3200),
            },
            MenuItem {
                product_id: "p-ceviche".to_string(),
                name: "Ceviche".to_string(),
                price: Money::from_cents(2800),
            },
        ]
    }

    fn run(conv: Conversation, inputs: &[&str]) -> Transition {
        let menu = menu();
        let mut t = Transition::to(conv, "");
        for input in inputs {
            t = handle(&t.next, input, &menu);
        }
        t
    }

    #[test]
    fn test_happy_path_delivery() {
        let t = run(
            Conversation::default(),
            &["Hola", "1 x2", "2", "listo", "1", "Av. Arequipa 123", "2"],
        );
        assert_eq!(t.next.state, ConversationState::Confirming);
        assert!(t.reply.contains("Delivery a: Av. Arequipa 123"));
        assert!(t.reply.contains("S/ 92.00"));

        let t = handle(&t.next, "Sí", &menu());
        assert_eq!(t.next, Conversation::default());
        match t.effect {
            Effect::PlaceOrder(draft) => {
                assert_eq!(draft.lines.len(), 2);
                assert_eq!(draft.total.cents(), 9200);
                assert_eq!(draft.fulfillment, Fulfillment::Delivery);
                assert_eq!(draft.payment_method, PaymentMethod::Yape);
            }
            other => panic!("expected PlaceOrder, got {:?}", other),
        }
    }

    #[test]
    fn test_pickup_skips_address() {
        let t = run(Conversation::default(), &["menu", "2", "listo", "2"]);
        assert_eq!(t.next.state, ConversationState::ChoosingPayment);
        assert_eq!(t.next.fulfillment, Some(Fulfillment::Pickup));
        assert_eq!(t.next.address, None);
    }

    #[test]
    fn test_item_parsing() {
        assert_eq!(parse_item("1"), Some((0, 1)));
        assert_eq!(parse_item("2 3"), Some((1, 3)));
        assert_eq!(parse_item("2 x3"), Some((1, 3)));
        assert_eq!(parse_item("2 x 3"), Some((1, 3)));
        assert_eq!(parse_item("0"), None);
        assert_eq!(parse_item("2 0"), None);
        assert_eq!(parse_item("dos"), None);
        assert_eq!(parse_item("1 2 3"), None);
    }

    #[test]
    fn test_same_item_merges() {
        let t = run(Conversation::default(), &["hola", "1", "1 x2"]);
        assert_eq!(t.next.cart.len(), 1);
        assert_eq!(t.next.cart[0].quantity, 3);
    }

    #[test]
    fn test_invalid_input_never_advances() {
        let browsing = run(Conversation::default(), &["hola"]).next;

        for (conv, input) in [
            (browsing.clone(), "quiero pizza"),
            (browsing.clone(), "9"),
            (browsing.clone(), "listo"),
        ] {
            let t = handle(&conv, input, &menu());
            assert_eq!(t.next, conv, "input {:?}", input);
            assert_eq!(t.effect, Effect::None);
        }

        let choosing = run(Conversation::default(), &["hola", "1", "listo"]).next;
        assert_eq!(handle(&choosing, "3", &menu()).next, choosing);

        let address = handle(&choosing, "1", &menu()).next;
        assert_eq!(handle(&address, "Av", &menu()).next, address);

        let paying = handle(&address, "Jr. Cusco 450", &menu()).next;
        assert_eq!(handle(&paying, "5", &menu()).next, paying);

        let confirming = handle(&paying, "1", &menu()).next;
        assert_eq!(handle(&confirming, "tal vez", &menu()).next, confirming);
    }

    #[test]
    fn test_cancel_resets() {
        let t = run(Conversation::default(), &["hola", "1 x2", "listo", "cancelar"]);
        assert_eq!(t.next, Conversation::default());
        assert!(t.next.cart.is_empty());
    }

    #[test]
    fn test_no_returns_to_browsing_with_cart() {
        let t = run(Conversation::default(), &["hola", "1", "listo", "2", "1", "no"]);
        assert_eq!(t.next.state, ConversationState::Browsing);
        assert_eq!(t.next.cart.len(), 1);
        assert_eq!(t.next.payment_method, None);
    }

    #[test]
    fn test_global_commands() {
        let browsing = run(Conversation::default(), &["hola", "1"]).next;

        let help = handle(&browsing, "AYUDA", &menu());
        assert_eq!(help.next, browsing);
        assert!(help.reply.contains("cancelar"));

        let status = handle(&browsing, "estado", &menu());
        assert_eq!(status.effect, Effect::ReportStatus);
        assert_eq!(status.next, browsing);

        let menu_again = handle(&browsing, "Menú", &menu());
        assert_eq!(menu_again.next.state, ConversationState::Browsing);
        assert_eq!(menu_again.next.cart, browsing.cart);
    }

    #[test]
    fn test_full_cart_refuses_new_item() {
        let browsing = run(Conversation::default(), &["hola", "1"]).next;
        let mut full = browsing.clone();
        full.cart = (0..MAX_LINES)
            .map(|i| CartLine {
                product_id: format!("p-{}", i),
                name: format!("Plato {}", i),
                unit_price: Money::from_cents(100),
                quantity: 1,
            })
            .collect();

        let t = handle(&full, "2", &menu());
        assert_eq!(t.next, full);
        assert!(t.reply.contains("lleno"));
    }

    #[test]
    fn test_item_numbers_follow_menu_shown() {
        let browsing = run(Conversation::default(), &["hola"]).next;
        assert_eq!(browsing.menu, vec!["p-lomo", "p-ceviche"]);

        // A new dish sorted first shifts positions in the live menu
        let mut changed = menu();
        changed.insert(
            0,
            MenuItem {
                product_id: "p-aji".to_string(),
                name: "Ají de gallina".to_string(),
                price: Money::from_cents(2500),
            },
        );
        let t = handle(&browsing, "2", &changed);
        assert_eq!(t.next.cart[0].product_id, "p-ceviche");

        // The shown dish was withdrawn
        let without_ceviche: Vec<MenuItem> =
            menu().into_iter().filter(|m| m.product_id != "p-ceviche").collect();
        let t = handle(&browsing, "2", &without_ceviche);
        assert_eq!(t.next, browsing);
        assert!(t.reply.contains("ya no está disponible"));
    }

    #[test]
    fn test_empty_menu() {
        let t = handle(&Conversation::default(), "hola", &[]);
        assert_eq!(t.next.state, ConversationState::Idle);
    }

    #[test]
    fn test_status_reply() {
        assert!(status_reply(Some(("#A1B2", OrderStatus::Dispatched))).contains("en camino"));
        assert!(status_reply(None).contains("No tienes"));
    }
}
