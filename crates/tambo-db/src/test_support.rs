//! Shared fixtures for repository tests: an in-memory database holding one
//! company, one branch, an admin user and three products.

use tambo_core::{Company, Product, Role, TenantScope};

use crate::pool::{Database, DbConfig};
use crate::repository::{NewBranch, NewCompany, NewProduct, NewUser};

pub(crate) struct Fixture {
    pub db: Database,
    pub company: Company,
    pub scope: TenantScope,
    pub user_id: String,
    /// Prepared dish, no kardex.
    pub lomo: Product,
    /// 20 units at S/ 2.50.
    pub inca: Product,
    /// 10 units at S/ 6.00.
    pub beer: Product,
}

pub(crate) async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let (company, scope, user_id) = tenant(&db, "20131312955").await;

    let inventory = db.scoped(&scope).inventory();
    let lomo = inventory
        .create_product_with_stock(&product("LOMO-01", "Lomo saltado", 3_500, false, 0, 0))
        .await
        .unwrap();
    let inca = inventory
        .create_product_with_stock(&product("INCA-500", "Inca Kola 500ml", 500, true, 20, 250))
        .await
        .unwrap();
    let beer = inventory
        .create_product_with_stock(&product("CUSQ-620", "Cusqueña 620ml", 1_200, true, 10, 600))
        .await
        .unwrap();

    Fixture {
        db,
        company,
        scope,
        user_id,
        lomo,
        inca,
        beer,
    }
}

/// Creates another company with its branch and admin in the same database.
pub(crate) async fn tenant(db: &Database, ruc: &str) -> (Company, TenantScope, String) {
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
                address: Some("Jr. de la Unión 100".to_string()),
            },
        )
        .await
        .unwrap();
    let user = companies
        .create_user(
            &company.id,
            &NewUser {
                branch_id: branch.id.clone(),
                username: "admin".to_string(),
                full_name: "Admin Tambo".to_string(),
                password_hash: "not-a-real-hash".to_string(),
                role: Role::Admin,
            },
        )
        .await
        .unwrap();

    let scope = TenantScope::new(&company.id, &branch.id);
    (company, scope, user.id)
}

pub(crate) fn product(
    sku: &str,
    name: &str,
    price_cents: i64,
    track_inventory: bool,
    initial_quantity: i64,
    unit_cost_cents: i64,
) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: name.to_string(),
        category: None,
        price_cents,
        track_inventory,
        allow_negative_stock: false,
        initial_quantity,
        unit_cost_cents,
    }
}

impl Fixture {
    /// Creates a register and opens a session with S/ 100.00.
    pub async fn open_session(&self) -> String {
        let cash = self.db.scoped(&self.scope).cash();
        let register = cash.create_register("Caja 1").await.unwrap();
        cash.open(&register.id, &self.user_id, 10_000).await.unwrap().id
    }
}
