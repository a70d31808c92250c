//! Read-side coverage: sale history filters, the sellable search, and the
//! commission aggregation over completed sales.

use chrono::Utc;
use uuid::Uuid;

use tienda_core::{
    commission, CommissionRule, CommissionScope, MovementKind, PaymentMap, RateKind, SaleStatus,
    Variant,
};
use tienda_db::{CreateSale, Database, DbConfig, MovementRequest, SaleFilters, SaleLine};

async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn seed_store_and_variant(db: &Database) -> Variant {
    sqlx::query("INSERT INTO stores (id, name) VALUES ('centro', 'Sucursal Centro')")
        .execute(db.pool())
        .await
        .unwrap();
    let now = Utc::now();
    let variant = Variant {
        id: Uuid::new_v4().to_string(),
        product_id: Uuid::new_v4().to_string(),
        category_id: Some("camisas".to_string()),
        sku: "CAM-AZUL-M".to_string(),
        name: "Camisa azul M".to_string(),
        price_cents: 29900,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.variants().create(&variant).await.unwrap();
    for store_id in [None, Some("centro".to_string())] {
        db.inventory()
            .apply_movement(&MovementRequest {
                kind: MovementKind::Entrada,
                variant_id: variant.id.clone(),
                store_id,
                quantity: 50,
                actor_id: "test".to_string(),
                reason: None,
            })
            .await
            .unwrap();
    }
    variant
}

fn sale(variant_id: &str, actor: &str, method: &str, qty: i64) -> CreateSale {
    let mut payments = PaymentMap::new();
    payments.insert(method.to_string(), 29900 * qty);
    CreateSale {
        store_id: Some("centro".to_string()),
        actor_id: actor.to_string(),
        actor_home_store: None,
        lines: vec![SaleLine {
            variant_id: Some(variant_id.to_string()),
            description: None,
            quantity: qty,
            unit_price_cents: None,
        }],
        payments,
        preventa: false,
        discount_code: None,
        tax_rate_bps: None,
        customer_name: None,
        customer_phone: None,
        notes: None,
    }
}

#[tokio::test]
async fn history_filters_by_status_actor_and_payment_method() {
    let db = test_db().await;
    let variant = seed_store_and_variant(&db).await;

    let cash = db
        .coordinator()
        .create_sale(sale(&variant.id, "ana", "efectivo", 1))
        .await
        .unwrap();
    db.coordinator()
        .create_sale(sale(&variant.id, "beto", "tarjeta", 2))
        .await
        .unwrap();
    db.coordinator()
        .cancel_sale(&cash.sale_id, "gerente-1", None)
        .await
        .unwrap();

    let (page, total) = db
        .sales()
        .list(&SaleFilters {
            estado: Some(SaleStatus::Cancelada),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(page[0].folio, cash.folio);

    let (page, total) = db
        .sales()
        .list(&SaleFilters {
            metodo_pago: Some("tarjeta".to_string()),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(page[0].actor_id, "beto");

    let (_, total) = db
        .sales()
        .list(&SaleFilters {
            actor_id: Some("ana".to_string()),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);

    // Pagination envelope: limit 1 still reports the full match count.
    let (page, total) = db
        .sales()
        .list(&SaleFilters { limit: 1, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(total, 2);
}

#[tokio::test]
async fn sellable_search_needs_stock_and_active_flag() {
    let db = test_db().await;
    let variant = seed_store_and_variant(&db).await;

    let hits = db.variants().search_sellable("azul", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].sku, variant.sku);
    assert_eq!(hits[0].stock_global, 50);

    db.variants().set_active(&variant.id, false).await.unwrap();
    let hits = db.variants().search_sellable("azul", 10).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn commission_report_covers_completed_sales_only() {
    let db = test_db().await;
    let variant = seed_store_and_variant(&db).await;

    db.commission_rules()
        .create(&CommissionRule {
            id: Uuid::new_v4().to_string(),
            name: "Base 3%".to_string(),
            kind: RateKind::Percentage,
            value: 300,
            scope: CommissionScope::All,
            reference_id: None,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    db.coordinator()
        .create_sale(sale(&variant.id, "ana", "efectivo", 2))
        .await
        .unwrap();
    let cancelled = db
        .coordinator()
        .create_sale(sale(&variant.id, "ana", "efectivo", 1))
        .await
        .unwrap();
    db.coordinator()
        .cancel_sale(&cancelled.sale_id, "gerente-1", None)
        .await
        .unwrap();

    let sales = db.sales().sales_for_commission(None, None).await.unwrap();
    assert_eq!(sales.len(), 1);

    let rules = db.commission_rules().list_active().await.unwrap();
    let summaries = commission::accrue(&sales, &rules);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].actor_id, "ana");
    assert_eq!(summaries[0].sale_count, 1);
    assert_eq!(summaries[0].total_sold_cents, 59800);
    // 3% of 598.00, half-up.
    assert_eq!(summaries[0].commission_cents, 1794);
}
