//! # tambo-seed
//!
//! Fills an empty database with a demo restaurant: company, branch, admin,
//! cashier and waiter, menu with opening stock, tables, a cash register,
//! two employees and a WhatsApp number.
//!
//! ```text
//! TAMBO_DATABASE_PATH=tambo.db TAMBO_SEED_PASSWORD=... cargo run --bin tambo-seed
//! ```
//! Logins use RUC 20131312955.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tambo_api::auth::hash_password;
use tambo_api::ApiConfig;
use tambo_core::payroll::PensionSystem;
use tambo_core::validation::validate_password;
use tambo_core::Role;
use tambo_db::{Database, EmployeeInput, NewBranch, NewCompany, NewProduct, NewUser};

const DEMO_RUC: &str = "20131312955";

struct MenuItem {
    sku: &'static str,
    name: &'static str,
    category: &'static str,
    price_cents: i64,
    stock: Option<(i64, i64)>,
}

const MENU: &[MenuItem] = &[
    MenuItem { sku: "LOMO-01", name: "Lomo saltado", category: "Platos", price_cents: 3_500, stock: None },
    MenuItem { sku: "CEVI-01", name: "Ceviche clásico", category: "Platos", price_cents: 3_200, stock: None },
    MenuItem { sku: "AJI-01", name: "Ají de gallina", category: "Platos", price_cents: 2_800, stock: None },
    MenuItem { sku: "INCA-500", name: "Inca Kola 500ml", category: "Bebidas", price_cents: 500, stock: Some((48, 250)) },
    MenuItem { sku: "CHICHA-1L", name: "Chicha morada 1L", category: "Bebidas", price_cents: 1_200, stock: Some((20, 400)) },
    MenuItem { sku: "CUSQ-620", name: "Cusqueña 620ml", category: "Bebidas", price_cents: 1_200, stock: Some((24, 600)) },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let password = std::env::var("TAMBO_SEED_PASSWORD").unwrap_or_else(|_| "tambo1234".to_string());
    validate_password(&password).context("TAMBO_SEED_PASSWORD")?;

    let config = ApiConfig::load()?;
    let db = Database::new(config.db_config()).await?;

    let companies = db.companies();
    if companies.find_login(DEMO_RUC, "admin").await?.is_some() {
        bail!("demo company {} already exists in {}", DEMO_RUC, config.database_path);
    }

    let company = companies
        .create_company(&NewCompany {
            ruc: DEMO_RUC.to_string(),
            legal_name: "Tambo Demo S.A.C.".to_string(),
            trade_name: Some("El Tambo".to_string()),
        })
        .await?;
    let branch = companies
        .create_branch(
            &company.id,
            &NewBranch {
                name: "Miraflores".to_string(),
                address: Some("Av. Larco 345, Miraflores".to_string()),
            },
        )
        .await?;
    info!(company = %company.legal_name, branch = %branch.name, "Company created");

    let password_hash = hash_password(&password)?;
    for (username, full_name, role) in [
        ("admin", "Administrador", Role::Admin),
        ("caja1", "Rosa Quispe", Role::Cashier),
        ("mozo1", "Luis Mamani", Role::Waiter),
        ("contador", "Carmen Flores", Role::Accountant),
    ] {
        companies
            .create_user(
                &company.id,
                &NewUser {
                    branch_id: branch.id.clone(),
                    username: username.to_string(),
                    full_name: full_name.to_string(),
                    password_hash: password_hash.clone(),
                    role,
                },
            )
            .await?;
    }

    let scope = tambo_core::TenantScope::new(company.id.clone(), branch.id.clone());
    let scoped = db.scoped(&scope);

    for item in MENU {
        let (initial_quantity, unit_cost_cents) = item.stock.unwrap_or((0, 0));
        scoped
            .inventory()
            .create_product_with_stock(&NewProduct {
                sku: item.sku.to_string(),
                name: item.name.to_string(),
                category: Some(item.category.to_string()),
                price_cents: item.price_cents,
                track_inventory: item.stock.is_some(),
                allow_negative_stock: false,
                initial_quantity,
                unit_cost_cents,
            })
            .await?;
    }

    for n in 1..=8 {
        scoped.tables().create(&format!("Mesa {}", n), 4).await?;
    }
    scoped.cash().create_register("Caja principal").await?;

    let payroll = scoped.payroll();
    let kitchen = payroll.create_area("Cocina").await?;
    let hall = payroll.create_area("Salón").await?;
    let cook = payroll.create_position("Cocinero", Some(&kitchen.id)).await?;
    let waiter = payroll.create_position("Mozo", Some(&hall.id)).await?;

    let hired_on = NaiveDate::from_ymd_opt(2025, 1, 2).context("hire date")?;
    for (dni, first, last, position, salary, system, has_dependents) in [
        ("45678901", "Jorge", "Huamán", &cook.id, 180_000, PensionSystem::Afp, true),
        ("45678902", "Luis", "Mamani", &waiter.id, 130_000, PensionSystem::Onp, false),
    ] {
        payroll
            .create_employee(&EmployeeInput {
                dni: dni.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                phone: None,
                area_id: None,
                position_id: Some(position.clone()),
                monthly_salary_cents: salary,
                pension_system: system,
                afp_commission_bps: if system == PensionSystem::Afp { 155 } else { 0 },
                has_dependents,
                hired_on,
            })
            .await?;
    }

    scoped.whatsapp().create_channel("+51900111222").await?;

    info!(ruc = DEMO_RUC, users = "admin, caja1, mozo1, contador", "Demo data ready");
    db.close().await;
    Ok(())
}
