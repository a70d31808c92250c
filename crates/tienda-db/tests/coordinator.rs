//! End-to-end tests for the transaction coordinator and the inventory
//! ledger, against an in-memory database.

use chrono::Utc;
use uuid::Uuid;

use tienda_core::{
    CoreError, DiscountCode, DiscountScope, LayawayStatus, MovementEffect, MovementKind,
    PaymentMap, RateKind, SaleStatus, StockScope, Variant,
};
use tienda_db::{
    CreateLayaway, CreateSale, Database, DbConfig, DbError, MovementRequest, SaleLine,
};

// =============================================================================
// Fixtures
// =============================================================================

async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn add_store(db: &Database, id: &str) {
    sqlx::query("INSERT INTO stores (id, name) VALUES (?1, ?2)")
        .bind(id)
        .bind(format!("Sucursal {id}"))
        .execute(db.pool())
        .await
        .unwrap();
}

async fn add_variant(db: &Database, sku: &str, price_cents: i64) -> Variant {
    let now = Utc::now();
    let variant = Variant {
        id: Uuid::new_v4().to_string(),
        product_id: Uuid::new_v4().to_string(),
        category_id: Some("camisas".to_string()),
        sku: sku.to_string(),
        name: format!("Artículo {sku}"),
        price_cents,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.variants().create(&variant).await.unwrap();
    variant
}

async fn stock(db: &Database, variant_id: &str, store_id: Option<&str>, qty: i64) {
    db.inventory()
        .apply_movement(&MovementRequest {
            kind: MovementKind::Entrada,
            variant_id: variant_id.to_string(),
            store_id: store_id.map(str::to_string),
            quantity: qty,
            actor_id: "test".to_string(),
            reason: None,
        })
        .await
        .unwrap();
}

fn variant_line(variant_id: &str, quantity: i64) -> SaleLine {
    SaleLine {
        variant_id: Some(variant_id.to_string()),
        description: None,
        quantity,
        unit_price_cents: None,
    }
}

fn cash(amount_cents: i64) -> PaymentMap {
    let mut payments = PaymentMap::new();
    payments.insert("efectivo".to_string(), amount_cents);
    payments
}

fn sale_input(store: &str, lines: Vec<SaleLine>, payments: PaymentMap) -> CreateSale {
    CreateSale {
        store_id: Some(store.to_string()),
        actor_id: "vendedor-1".to_string(),
        actor_home_store: None,
        lines,
        payments,
        preventa: false,
        discount_code: None,
        tax_rate_bps: None,
        customer_name: None,
        customer_phone: None,
        notes: None,
    }
}

fn layaway_input(store: &str, lines: Vec<SaleLine>) -> CreateLayaway {
    CreateLayaway {
        store_id: Some(store.to_string()),
        actor_id: "vendedor-1".to_string(),
        actor_home_store: None,
        lines,
        customer_name: Some("Ana".to_string()),
        customer_phone: Some("5512345678".to_string()),
        notes: None,
    }
}

/// Standard scenario: one store, one variant, global 10 / store 4.
async fn scenario() -> (Database, Variant) {
    let db = test_db().await;
    add_store(&db, "centro").await;
    let variant = add_variant(&db, "CAM-AZUL-M", 29900).await;
    stock(&db, &variant.id, None, 10).await;
    stock(&db, &variant.id, Some("centro"), 4).await;
    (db, variant)
}

// =============================================================================
// Sale creation
// =============================================================================

#[tokio::test]
async fn sale_decrements_both_scopes_and_logs_per_scope() {
    let (db, variant) = scenario().await;

    let receipt = db
        .coordinator()
        .create_sale(sale_input("centro", vec![variant_line(&variant.id, 3)], cash(89700)))
        .await
        .unwrap();

    assert_eq!(receipt.status, SaleStatus::Completada);
    assert_eq!(receipt.total_cents, 89700);
    assert!(receipt.folio.starts_with("V-"));

    let snapshot = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!(snapshot.global, 7);
    assert_eq!(snapshot.store, Some(1));

    let movements = db.inventory().movements(&variant.id, 50).await.unwrap();
    let salidas: Vec<_> = movements
        .iter()
        .filter(|m| m.kind == MovementKind::Salida)
        .collect();
    assert_eq!(salidas.len(), 2);
    assert!(salidas.iter().any(|m| m.store_id.is_none()));
    assert!(salidas.iter().any(|m| m.store_id.as_deref() == Some("centro")));
    for m in salidas {
        assert_eq!(m.reason.as_deref(), Some(receipt.folio.as_str()));
    }
}

#[tokio::test]
async fn sale_fails_at_store_scope_when_global_would_cover() {
    let (db, variant) = scenario().await;

    // Global has 10 but the store only has 4.
    let err = db
        .coordinator()
        .create_sale(sale_input("centro", vec![variant_line(&variant.id, 5)], cash(149500)))
        .await
        .unwrap_err();

    match err {
        DbError::Domain(CoreError::InsufficientStock { scope, requested, available, .. }) => {
            assert_eq!(scope, StockScope::Store);
            assert_eq!(requested, 5);
            assert_eq!(available, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn sale_fails_at_global_scope_first() {
    let db = test_db().await;
    add_store(&db, "centro").await;
    let variant = add_variant(&db, "CAM-AZUL-G", 29900).await;
    stock(&db, &variant.id, None, 2).await;
    stock(&db, &variant.id, Some("centro"), 4).await;

    let err = db
        .coordinator()
        .create_sale(sale_input("centro", vec![variant_line(&variant.id, 3)], cash(89700)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Domain(CoreError::InsufficientStock { scope: StockScope::Global, .. })
    ));
}

#[tokio::test]
async fn not_stocked_in_store_is_distinct_from_insufficiency() {
    let db = test_db().await;
    add_store(&db, "centro").await;
    let variant = add_variant(&db, "PAN-NEGRO-32", 49900).await;
    stock(&db, &variant.id, None, 10).await;
    // No store row at all.

    let err = db
        .coordinator()
        .create_sale(sale_input("centro", vec![variant_line(&variant.id, 1)], cash(49900)))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Domain(CoreError::NotStockedInStore { .. })));
}

#[tokio::test]
async fn failed_sale_rolls_back_every_effect() {
    let (db, variant) = scenario().await;
    let other = add_variant(&db, "GORRA-UNI", 15900).await;
    // `other` has no stock anywhere, so the second line must fail.

    let err = db
        .coordinator()
        .create_sale(sale_input(
            "centro",
            vec![variant_line(&variant.id, 2), variant_line(&other.id, 1)],
            cash(75700),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));

    let snapshot = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!(snapshot.global, 10);
    assert_eq!(snapshot.store, Some(4));

    let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(sales, 0);
}

#[tokio::test]
async fn folios_are_sequential_per_series() {
    let (db, variant) = scenario().await;

    let first = db
        .coordinator()
        .create_sale(sale_input("centro", vec![variant_line(&variant.id, 1)], cash(29900)))
        .await
        .unwrap();
    let second = db
        .coordinator()
        .create_sale(sale_input("centro", vec![variant_line(&variant.id, 1)], cash(29900)))
        .await
        .unwrap();

    assert_eq!(first.folio, "V-000001");
    assert_eq!(second.folio, "V-000002");
}

#[tokio::test]
async fn free_text_line_requires_description_and_price() {
    let (db, _) = scenario().await;

    let err = db
        .coordinator()
        .create_sale(sale_input(
            "centro",
            vec![SaleLine {
                variant_id: None,
                description: None,
                quantity: 1,
                unit_price_cents: Some(5000),
            }],
            cash(5000),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

    // A proper free-text line sells without touching inventory.
    let receipt = db
        .coordinator()
        .create_sale(sale_input(
            "centro",
            vec![SaleLine {
                variant_id: None,
                description: Some("Ajuste de bastilla".to_string()),
                quantity: 1,
                unit_price_cents: Some(5000),
            }],
            cash(5000),
        ))
        .await
        .unwrap();
    assert_eq!(receipt.total_cents, 5000);
}

#[tokio::test]
async fn home_store_wins_over_explicit_store() {
    let (db, variant) = scenario().await;
    add_store(&db, "norte").await;
    stock(&db, &variant.id, Some("norte"), 4).await;

    let mut input = sale_input("norte", vec![variant_line(&variant.id, 1)], cash(29900));
    input.actor_home_store = Some("centro".to_string());
    db.coordinator().create_sale(input).await.unwrap();

    let home = db.inventory().stock_snapshot(&variant.id, Some("centro")).await.unwrap();
    let explicit = db.inventory().stock_snapshot(&variant.id, Some("norte")).await.unwrap();
    assert_eq!(home.store, Some(3));
    assert_eq!(explicit.store, Some(4));
}

#[tokio::test]
async fn store_resolution_falls_back_to_actor_home() {
    let (db, variant) = scenario().await;

    let mut input = sale_input("centro", vec![variant_line(&variant.id, 1)], cash(29900));
    input.store_id = None;
    input.actor_home_store = Some("centro".to_string());
    db.coordinator().create_sale(input).await.unwrap();

    let mut input = sale_input("centro", vec![variant_line(&variant.id, 1)], cash(29900));
    input.store_id = None;
    input.actor_home_store = None;
    let err = db.coordinator().create_sale(input).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::StoreRequired)));
}

// =============================================================================
// Preventa → cobrar
// =============================================================================

#[tokio::test]
async fn preventa_decrements_at_creation_and_settles_without_retouching() {
    let (db, variant) = scenario().await;

    let mut input = sale_input("centro", vec![variant_line(&variant.id, 2)], PaymentMap::new());
    input.preventa = true;
    let receipt = db.coordinator().create_sale(input).await.unwrap();
    assert_eq!(receipt.status, SaleStatus::Pendiente);

    let snapshot = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!((snapshot.global, snapshot.store), (8, Some(2)));

    let sale = db
        .coordinator()
        .settle_sale(&receipt.sale_id, cash(59800))
        .await
        .unwrap();
    assert_eq!(sale.status, SaleStatus::Completada);
    assert!(sale.completed_at.is_some());
    assert_eq!(sale.payments.get("efectivo"), Some(&59800));

    // Settlement never touches the counters again.
    let snapshot = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!((snapshot.global, snapshot.store), (8, Some(2)));

    // Settling twice is a state conflict.
    let err = db
        .coordinator()
        .settle_sale(&receipt.sale_id, cash(59800))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::StateConflict { .. })));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn cancel_restores_stock_and_double_cancel_conflicts() {
    let (db, variant) = scenario().await;

    let receipt = db
        .coordinator()
        .create_sale(sale_input("centro", vec![variant_line(&variant.id, 3)], cash(89700)))
        .await
        .unwrap();

    let sale = db
        .coordinator()
        .cancel_sale(&receipt.sale_id, "gerente-1", Some("cliente se arrepintió"))
        .await
        .unwrap();
    assert_eq!(sale.status, SaleStatus::Cancelada);
    assert!(sale.notes.unwrap().contains("cliente se arrepintió"));

    let snapshot = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!((snapshot.global, snapshot.store), (10, Some(4)));

    let err = db
        .coordinator()
        .cancel_sale(&receipt.sale_id, "gerente-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::StateConflict { .. })));

    // No double restore.
    let snapshot = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!((snapshot.global, snapshot.store), (10, Some(4)));
}

// =============================================================================
// Discount codes
// =============================================================================

async fn add_code(db: &Database, code: DiscountCode) {
    db.discount_codes().create(&code).await.unwrap();
}

fn percentage_code(label: &str, bps: i64, max_discount: Option<i64>) -> DiscountCode {
    DiscountCode {
        id: Uuid::new_v4().to_string(),
        code: label.to_string(),
        kind: RateKind::Percentage,
        value: bps,
        min_purchase_cents: None,
        max_discount_cents: max_discount,
        max_uses: None,
        max_uses_per_customer: None,
        scope: DiscountScope::All,
        reference_ids: Vec::new(),
        valid_from: None,
        valid_until: None,
        is_active: true,
        times_used: 0,
    }
}

#[tokio::test]
async fn capped_percentage_discount_and_use_recording() {
    let (db, variant) = scenario().await;
    // 10% capped at $50.00 over a $299.00 sale caps to 29.90 → uncapped;
    // use a large cap subtotal instead: 3 × 299.00 = 897.00, 10% = 89.70,
    // capped at 50.00.
    add_code(&db, percentage_code("PROMO10", 1000, Some(5000))).await;

    let mut input = sale_input("centro", vec![variant_line(&variant.id, 3)], cash(84700));
    input.discount_code = Some("PROMO10".to_string());
    input.customer_phone = Some("5512345678".to_string());
    let receipt = db.coordinator().create_sale(input).await.unwrap();

    assert_eq!(receipt.subtotal_cents, 89700);
    assert_eq!(receipt.discount_cents, 5000);
    assert_eq!(receipt.total_cents, 84700);

    let code = db.discount_codes().get_by_code("PROMO10").await.unwrap();
    assert_eq!(code.times_used, 1);
}

#[tokio::test]
async fn per_customer_cap_blocks_second_use() {
    let (db, variant) = scenario().await;
    let mut code = percentage_code("UNAVEZ", 500, None);
    code.max_uses_per_customer = Some(1);
    add_code(&db, code).await;

    let mut input = sale_input("centro", vec![variant_line(&variant.id, 1)], cash(28405));
    input.discount_code = Some("UNAVEZ".to_string());
    input.customer_phone = Some("5599887766".to_string());
    db.coordinator().create_sale(input.clone()).await.unwrap();

    input.payments = cash(28405);
    let err = db.coordinator().create_sale(input).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Domain(CoreError::PerCustomerLimitReached(_))
    ));
}

#[tokio::test]
async fn unknown_code_rejects_the_sale() {
    let (db, variant) = scenario().await;

    let mut input = sale_input("centro", vec![variant_line(&variant.id, 1)], cash(29900));
    input.discount_code = Some("NOEXISTE".to_string());
    let err = db.coordinator().create_sale(input).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::CodeNotFound(_))));
}

// =============================================================================
// Ledger invariants
// =============================================================================

#[tokio::test]
async fn movement_log_sums_to_counter_including_ajuste() {
    let db = test_db().await;
    add_store(&db, "centro").await;
    let variant = add_variant(&db, "GORRA-UNI", 15900).await;

    stock(&db, &variant.id, None, 10).await;
    db.inventory()
        .apply_movement(&MovementRequest {
            kind: MovementKind::Salida,
            variant_id: variant.id.clone(),
            store_id: None,
            quantity: 3,
            actor_id: "test".to_string(),
            reason: None,
        })
        .await
        .unwrap();
    // Physical recount to 5: logged as a signed delta of -2.
    db.inventory()
        .apply_movement(&MovementRequest {
            kind: MovementKind::Ajuste,
            variant_id: variant.id.clone(),
            store_id: None,
            quantity: 5,
            actor_id: "test".to_string(),
            reason: Some("conteo físico".to_string()),
        })
        .await
        .unwrap();

    let snapshot = db.inventory().stock_snapshot(&variant.id, None).await.unwrap();
    assert_eq!(snapshot.global, 5);

    let movements = db.inventory().movements(&variant.id, 50).await.unwrap();
    let signed_sum: i64 = movements
        .iter()
        .filter(|m| m.store_id.is_none())
        .map(|m| match m.kind.effect() {
            MovementEffect::Add => m.quantity,
            MovementEffect::Subtract => -m.quantity,
            // Ajuste rows carry the signed delta directly.
            MovementEffect::Set => m.quantity,
        })
        .sum();
    assert_eq!(signed_sum, 5);
}

#[tokio::test]
async fn decrement_past_zero_is_rejected_and_counter_unchanged() {
    let db = test_db().await;
    let variant = add_variant(&db, "CAM-AZUL-M", 29900).await;
    stock(&db, &variant.id, None, 2).await;

    let err = db
        .inventory()
        .apply_movement(&MovementRequest {
            kind: MovementKind::Salida,
            variant_id: variant.id.clone(),
            store_id: None,
            quantity: 3,
            actor_id: "test".to_string(),
            reason: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Domain(CoreError::InsufficientStock { available: 2, requested: 3, .. })
    ));

    let snapshot = db.inventory().stock_snapshot(&variant.id, None).await.unwrap();
    assert_eq!(snapshot.global, 2);
}

#[tokio::test]
async fn transfer_moves_between_stores_leaving_global_alone() {
    let db = test_db().await;
    add_store(&db, "centro").await;
    add_store(&db, "norte").await;
    let variant = add_variant(&db, "CAM-AZUL-M", 29900).await;
    stock(&db, &variant.id, None, 10).await;
    stock(&db, &variant.id, Some("centro"), 6).await;

    db.inventory()
        .transfer(&variant.id, "centro", "norte", 4, "gerente-1", None)
        .await
        .unwrap();

    let centro = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    let norte = db
        .inventory()
        .stock_snapshot(&variant.id, Some("norte"))
        .await
        .unwrap();
    assert_eq!(centro.store, Some(2));
    assert_eq!(norte.store, Some(4));
    assert_eq!(centro.global, 10);

    let movements = db.inventory().movements(&variant.id, 50).await.unwrap();
    let transfers: Vec<_> = movements
        .iter()
        .filter(|m| m.kind == MovementKind::Transferencia)
        .collect();
    assert_eq!(transfers.len(), 2);

    // Per-store signed sums must match the counter deltas of the transfer.
    let signed_sum = |store: &str| -> i64 {
        movements
            .iter()
            .filter(|m| m.store_id.as_deref() == Some(store) && m.kind == MovementKind::Transferencia)
            .map(|m| match m.kind.effect() {
                MovementEffect::Add | MovementEffect::Set => m.quantity,
                MovementEffect::Subtract => -m.quantity,
            })
            .sum()
    };
    assert_eq!(signed_sum("centro"), -4);
    assert_eq!(signed_sum("norte"), 4);

    // Origin short by more than it has: both legs roll back.
    let err = db
        .inventory()
        .transfer(&variant.id, "centro", "norte", 5, "gerente-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));
    let norte = db
        .inventory()
        .stock_snapshot(&variant.id, Some("norte"))
        .await
        .unwrap();
    assert_eq!(norte.store, Some(4));
}

// =============================================================================
// Layaways
// =============================================================================

#[tokio::test]
async fn layaway_reserves_stock_and_walks_the_lifecycle() {
    let (db, variant) = scenario().await;

    let receipt = db
        .coordinator()
        .create_layaway(layaway_input("centro", vec![variant_line(&variant.id, 2)]))
        .await
        .unwrap();
    assert!(receipt.folio.starts_with("A-"));
    assert_eq!(receipt.total_cents, 59800);

    let snapshot = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!((snapshot.global, snapshot.store), (8, Some(2)));

    // Partial deposit keeps it activo.
    let layaway = db
        .coordinator()
        .add_deposit(&receipt.layaway_id, 20000, "efectivo", "vendedor-1")
        .await
        .unwrap();
    assert_eq!(layaway.status, LayawayStatus::Activo);
    assert_eq!(layaway.total_abonado_cents, 20000);
    assert_eq!(layaway.saldo_pendiente_cents(), 39800);

    // Overpaying the balance is rejected.
    let err = db
        .coordinator()
        .add_deposit(&receipt.layaway_id, 40000, "efectivo", "vendedor-1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Domain(CoreError::DepositExceedsBalance { .. })
    ));

    // Exact payoff auto-advances to pagado.
    let layaway = db
        .coordinator()
        .add_deposit(&receipt.layaway_id, 39800, "tarjeta", "vendedor-1")
        .await
        .unwrap();
    assert_eq!(layaway.status, LayawayStatus::Pagado);

    // Each deposit minted a completada sale.
    let deposits = db.layaways().get_deposits(&receipt.layaway_id).await.unwrap();
    assert_eq!(deposits.len(), 2);
    for deposit in &deposits {
        let sale = db
            .sales()
            .get_by_id(deposit.sale_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(sale.status, SaleStatus::Completada);
        assert_eq!(sale.total_cents, deposit.amount_cents);
    }

    // pagado → listo → entregado; delivery stamps the timestamp.
    db.coordinator()
        .set_layaway_status(&receipt.layaway_id, LayawayStatus::Listo, "vendedor-1")
        .await
        .unwrap();
    let layaway = db
        .coordinator()
        .set_layaway_status(&receipt.layaway_id, LayawayStatus::Entregado, "vendedor-1")
        .await
        .unwrap();
    assert!(layaway.delivered_at.is_some());

    // Terminal: no more deposits, no cancellation.
    let err = db
        .coordinator()
        .add_deposit(&receipt.layaway_id, 100, "efectivo", "vendedor-1")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::StateConflict { .. })));
}

#[tokio::test]
async fn abono_receipt_sales_cannot_be_cancelled_directly() {
    let (db, variant) = scenario().await;

    let receipt = db
        .coordinator()
        .create_layaway(layaway_input("centro", vec![variant_line(&variant.id, 2)]))
        .await
        .unwrap();
    db.coordinator()
        .add_deposit(&receipt.layaway_id, 20000, "efectivo", "vendedor-1")
        .await
        .unwrap();

    let deposits = db.layaways().get_deposits(&receipt.layaway_id).await.unwrap();
    let sale_id = deposits[0].sale_id.clone().unwrap();
    let err = db
        .coordinator()
        .cancel_sale(&sale_id, "gerente-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::StateConflict { .. })));

    // The receipt and the paid-in total are untouched.
    let sale = db.sales().get_by_id(&sale_id).await.unwrap();
    assert_eq!(sale.status, SaleStatus::Completada);
    let layaway = db.layaways().get_by_id(&receipt.layaway_id).await.unwrap();
    assert_eq!(layaway.total_abonado_cents, 20000);
}

#[tokio::test]
async fn cancelled_layaway_releases_reserved_stock() {
    let (db, variant) = scenario().await;

    let receipt = db
        .coordinator()
        .create_layaway(layaway_input("centro", vec![variant_line(&variant.id, 3)]))
        .await
        .unwrap();

    db.coordinator()
        .set_layaway_status(&receipt.layaway_id, LayawayStatus::Cancelado, "gerente-1")
        .await
        .unwrap();

    let snapshot = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!((snapshot.global, snapshot.store), (10, Some(4)));
}

#[tokio::test]
async fn replacing_layaway_items_reconciles_reservations_and_total() {
    let (db, variant) = scenario().await;
    let other = add_variant(&db, "PAN-NEGRO-32", 49900).await;
    stock(&db, &other.id, None, 5).await;
    stock(&db, &other.id, Some("centro"), 5).await;

    let receipt = db
        .coordinator()
        .create_layaway(layaway_input("centro", vec![variant_line(&variant.id, 2)]))
        .await
        .unwrap();

    let layaway = db
        .coordinator()
        .replace_layaway_items(&receipt.layaway_id, vec![variant_line(&other.id, 1)], "vendedor-1")
        .await
        .unwrap();
    assert_eq!(layaway.total_cents, 49900);

    // Old reservation released, new one taken.
    let old = db
        .inventory()
        .stock_snapshot(&variant.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!((old.global, old.store), (10, Some(4)));
    let new = db
        .inventory()
        .stock_snapshot(&other.id, Some("centro"))
        .await
        .unwrap();
    assert_eq!((new.global, new.store), (4, Some(4)));

    // New total may not fall below what the customer already paid.
    db.coordinator()
        .add_deposit(&receipt.layaway_id, 49900, "efectivo", "vendedor-1")
        .await
        .unwrap();
    let err = db
        .coordinator()
        .replace_layaway_items(
            &receipt.layaway_id,
            vec![SaleLine {
                variant_id: None,
                description: Some("Artículo menor".to_string()),
                quantity: 1,
                unit_price_cents: Some(10000),
            }],
            "vendedor-1",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
}

#[tokio::test]
async fn enlarging_a_paid_layaway_reopens_it_as_activo() {
    let (db, variant) = scenario().await;

    let receipt = db
        .coordinator()
        .create_layaway(layaway_input("centro", vec![variant_line(&variant.id, 1)]))
        .await
        .unwrap();
    let layaway = db
        .coordinator()
        .add_deposit(&receipt.layaway_id, 29900, "efectivo", "vendedor-1")
        .await
        .unwrap();
    assert_eq!(layaway.status, LayawayStatus::Pagado);

    // A bigger item list reopens the balance; pagado no longer holds.
    let layaway = db
        .coordinator()
        .replace_layaway_items(&receipt.layaway_id, vec![variant_line(&variant.id, 2)], "vendedor-1")
        .await
        .unwrap();
    assert_eq!(layaway.status, LayawayStatus::Activo);
    assert_eq!(layaway.total_cents, 59800);
    assert_eq!(layaway.saldo_pendiente_cents(), 29900);

    // Paying it off again and packing it freezes the item list.
    db.coordinator()
        .add_deposit(&receipt.layaway_id, 29900, "efectivo", "vendedor-1")
        .await
        .unwrap();
    db.coordinator()
        .set_layaway_status(&receipt.layaway_id, LayawayStatus::Listo, "vendedor-1")
        .await
        .unwrap();
    let err = db
        .coordinator()
        .replace_layaway_items(&receipt.layaway_id, vec![variant_line(&variant.id, 1)], "vendedor-1")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::StateConflict { .. })));
}
