//! Seeds a demo database: two stores, a small catalog with stock at both
//! scopes, one discount code and one commission rule.
//!
//! ```bash
//! TIENDA_DATABASE_PATH=tienda.db cargo run -p tienda-db --bin seed
//! ```

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use tienda_core::{
    CommissionRule, CommissionScope, DiscountCode, DiscountScope, MovementKind, RateKind, Variant,
};
use tienda_db::{Database, DbConfig, MovementRequest};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::var("TIENDA_DATABASE_PATH").unwrap_or_else(|_| "tienda.db".to_string());
    let db = Database::new(DbConfig::new(&path)).await?;

    seed_stores(&db).await?;
    let variants = seed_catalog(&db).await?;
    seed_stock(&db, &variants).await?;
    seed_promotions(&db).await?;
    seed_commissions(&db).await?;

    tracing::info!(path = %path, "Demo data seeded");
    db.close().await;
    Ok(())
}

async fn seed_stores(db: &Database) -> Result<()> {
    for (id, name) in [("centro", "Sucursal Centro"), ("norte", "Sucursal Norte")] {
        sqlx::query("INSERT OR IGNORE INTO stores (id, name) VALUES (?1, ?2)")
            .bind(id)
            .bind(name)
            .execute(db.pool())
            .await?;
    }
    Ok(())
}

async fn seed_catalog(db: &Database) -> Result<Vec<Variant>> {
    let now = Utc::now();
    let specs = [
        ("CAM-AZUL-M", "Camisa azul M", "camisas", 29900),
        ("CAM-AZUL-G", "Camisa azul G", "camisas", 29900),
        ("PAN-NEGRO-32", "Pantalón negro 32", "pantalones", 49900),
        ("GORRA-UNI", "Gorra unitalla", "accesorios", 15900),
    ];

    let mut variants = Vec::new();
    for (sku, name, category, price_cents) in specs {
        let variant = Variant {
            id: Uuid::new_v4().to_string(),
            product_id: Uuid::new_v4().to_string(),
            category_id: Some(category.to_string()),
            sku: sku.to_string(),
            name: name.to_string(),
            price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.variants().create(&variant).await?;
        variants.push(variant);
    }
    Ok(variants)
}

async fn seed_stock(db: &Database, variants: &[Variant]) -> Result<()> {
    for variant in variants {
        // Global pool first, then a split across the two stores.
        db.inventory()
            .apply_movement(&MovementRequest {
                kind: MovementKind::Entrada,
                variant_id: variant.id.clone(),
                store_id: None,
                quantity: 20,
                actor_id: "seed".to_string(),
                reason: Some("carga inicial".to_string()),
            })
            .await?;
        for (store, qty) in [("centro", 12), ("norte", 8)] {
            db.inventory()
                .apply_movement(&MovementRequest {
                    kind: MovementKind::Entrada,
                    variant_id: variant.id.clone(),
                    store_id: Some(store.to_string()),
                    quantity: qty,
                    actor_id: "seed".to_string(),
                    reason: Some("carga inicial".to_string()),
                })
                .await?;
        }
    }
    Ok(())
}

async fn seed_promotions(db: &Database) -> Result<()> {
    db.discount_codes()
        .create(&DiscountCode {
            id: Uuid::new_v4().to_string(),
            code: "BIENVENIDA10".to_string(),
            kind: RateKind::Percentage,
            value: 1000,
            min_purchase_cents: Some(20000),
            max_discount_cents: Some(10000),
            max_uses: Some(100),
            max_uses_per_customer: Some(1),
            scope: DiscountScope::All,
            reference_ids: Vec::new(),
            valid_from: None,
            valid_until: None,
            is_active: true,
            times_used: 0,
        })
        .await?;
    Ok(())
}

async fn seed_commissions(db: &Database) -> Result<()> {
    db.commission_rules()
        .create(&CommissionRule {
            id: Uuid::new_v4().to_string(),
            name: "Comisión base ventas".to_string(),
            kind: RateKind::Percentage,
            value: 300,
            scope: CommissionScope::All,
            reference_id: None,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        })
        .await?;
    Ok(())
}
