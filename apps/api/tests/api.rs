//! Router-level tests: the whole stack from HTTP down to in-memory SQLite.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use tambo_api::auth::hash_password;
use tambo_api::{build_router, ApiConfig, AppState};
use tambo_core::{Role, TenantScope};
use tambo_db::{Database, DbConfig, NewBranch, NewCompany, NewUser};

const PASSWORD: &str = "clave-segura-1";
const RUC: &str = "20131312955";

struct TestApp {
    router: Router,
    db: Database,
    scope: TenantScope,
}

/// App with one company, its branch and four users (one per role).
async fn setup() -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let scope = tenant(&db, RUC).await;
    let config = ApiConfig::from_builder(config::Config::builder()).unwrap();
    let router = build_router(AppState::new(db.clone(), &config), None);
    TestApp { router, db, scope }
}

async fn tenant(db: &Database, ruc: &str) -> TenantScope {
    let companies = db.companies();
    let company = companies
        .create_company(&NewCompany {
            ruc: ruc.to_string(),
            legal_name: format!("Empresa {}", ruc),
            trade_name: None,
        })
        .await
        .unwrap();
    let branch = companies
        .create_branch(
            &company.id,
            &NewBranch {
                name: "Centro".to_string(),
                address: None,
            },
        )
        .await
        .unwrap();

    let hash = hash_password(PASSWORD).unwrap();
    for (username, role) in [
        ("admin", Role::Admin),
        ("caja1", Role::Cashier),
        ("mozo1", Role::Waiter),
        ("contador", Role::Accountant),
    ] {
        companies
            .create_user(
                &company.id,
                &NewUser {
                    branch_id: branch.id.clone(),
                    username: username.to_string(),
                    full_name: username.to_string(),
                    password_hash: hash.clone(),
                    role,
                },
            )
            .await
            .unwrap();
    }

    TenantScope::new(company.id, branch.id)
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn login_as(&self, ruc: &str, username: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "ruc": ruc, "username": username, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    async fn login(&self, username: &str) -> String {
        self.login_as(RUC, username).await
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, Some(token), body)).await
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// =============================================================================
// Health & Auth
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_auth() {
    let app = setup().await;
    let (status, body) = app
        .send(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = setup().await;
    let (status, body) = app
        .send(Request::builder().uri("/api/products").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let app = setup().await;
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "ruc": RUC, "username": "admin", "password": "incorrecta" }),
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_me_returns_scope() {
    let app = setup().await;
    let token = app.login("caja1").await;

    let (status, body) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "cashier");
    assert_eq!(body["data"]["scope"]["branch_id"], app.scope.branch_id.as_str());
    assert!(body["data"]["user"].get("password_hash").is_none());
}

// =============================================================================
// Roles
// =============================================================================

#[tokio::test]
async fn test_role_guards() {
    let app = setup().await;
    let waiter = app.login("mozo1").await;
    let accountant = app.login("contador").await;

    let (status, body) = app.get("/api/payroll/periods", &waiter).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app.get("/api/payroll/periods", &accountant).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/api/cash/registers", &accountant, json!({ "name": "Caja 2" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// POS flow
// =============================================================================

#[tokio::test]
async fn test_checkout_over_http() {
    let app = setup().await;
    let admin = app.login("admin").await;
    let cashier = app.login("caja1").await;

    let (status, product) = app
        .post(
            "/api/products",
            &admin,
            json!({
                "sku": "INCA-500",
                "name": "Inca Kola 500ml",
                "price_cents": 500,
                "initial_quantity": 10,
                "unit_cost_cents": 250
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{product}");
    let product_id = product["data"]["id"].as_str().unwrap().to_string();

    let (_, register) = app.post("/api/cash/registers", &admin, json!({ "name": "Caja 1" })).await;
    let register_id = register["data"]["id"].as_str().unwrap().to_string();
    let (status, session) = app
        .post(
            &format!("/api/cash/registers/{}/open", register_id),
            &cashier,
            json!({ "opening_cents": 5_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{session}");
    let session_id = session["data"]["id"].as_str().unwrap().to_string();

    let (status, sale) = app
        .post(
            "/api/sales",
            &cashier,
            json!({
                "session_id": session_id,
                "document_kind": "boleta",
                "customer": { "doc_type": "none" },
                "source": {
                    "type": "items",
                    "items": [{ "product_id": product_id, "quantity": 3 }]
                },
                "payments": [{ "method": "cash", "amount_cents": 2_000 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{sale}");
    assert_eq!(sale["data"]["document_number"], "B001-00000001");
    assert_eq!(sale["data"]["total_cents"], 1_500);
    assert_eq!(sale["data"]["change_cents"], 500);

    let (_, stock) = app.get("/api/inventory/stock", &cashier).await;
    assert_eq!(stock["data"][0]["quantity"], 7);

    // More than what is left
    let (status, body) = app
        .post(
            "/api/sales",
            &cashier,
            json!({
                "session_id": session_id,
                "document_kind": "boleta",
                "customer": { "doc_type": "none" },
                "source": {
                    "type": "items",
                    "items": [{ "product_id": product_id, "quantity": 50 }]
                },
                "payments": [{ "method": "card", "amount_cents": 25_000 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (status, _) = app
        .post(
            &format!("/api/cash/registers/{}/open", register_id),
            &cashier,
            json!({ "opening_cents": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let app = setup().await;
    let admin = app.login("admin").await;

    let (status, body) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/tables")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                .body(Body::from("{\"label\": "))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_other_tenant_cannot_read_product() {
    let app = setup().await;
    tenant(&app.db, "20100070970").await;
    let ours = app.login("admin").await;
    let theirs = app.login_as("20100070970", "admin").await;

    let (_, product) = app
        .post(
            "/api/products",
            &ours,
            json!({ "sku": "LOMO-01", "name": "Lomo saltado", "price_cents": 3_500, "track_inventory": false }),
        )
        .await;
    let uri = format!("/api/products/{}", product["data"]["id"].as_str().unwrap());

    let (status, _) = app.get(&uri, &ours).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get(&uri, &theirs).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

// =============================================================================
// WhatsApp
// =============================================================================

#[tokio::test]
async fn test_whatsapp_webhook_replies_with_twiml() {
    let app = setup().await;
    let admin = app.login("admin").await;

    app.post(
        "/api/products",
        &admin,
        json!({ "sku": "LOMO-01", "name": "Lomo saltado", "price_cents": 3_500, "track_inventory": false }),
    )
    .await;
    let (status, _) = app
        .post("/api/whatsapp/channels", &admin, json!({ "phone_number": "+51900111222" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let webhook = |to: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/whatsapp/webhook")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "From=whatsapp%3A%2B51987654321&To=whatsapp%3A%2B{}&Body=hola",
                to
            )))
            .unwrap()
    };

    let response = app.router.clone().oneshot(webhook("51900111222")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("application/xml"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let xml = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(xml.contains("<Message>"));
    assert!(xml.contains("Lomo saltado"));

    // Unknown business number: empty reply, no error
    let response = app.router.clone().oneshot(webhook("51911111111")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("<Response/>"));
}
