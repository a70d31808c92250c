//! # Transaction Coordinator
//!
//! Everything that mutates a sale or layaway together with the inventory
//! ledger funnels through here, each operation as exactly one sqlx
//! transaction. The validating reads and the mutating writes share that
//! transaction, so a concurrent request can never observe or act on a
//! half-applied state.
//!
//! ```text
//! create_sale ──┐
//! cancel_sale ──┤                     ┌── sales / sale_items
//! settle_sale ──┼── ONE transaction ──┼── inventory counters + movements
//! create_layaway┤                     ├── folios
//! add_deposit ──┤                     └── discount_code_uses
//! set_layaway_status / replace_layaway_items
//! ```
//!
//! Any error before commit rolls everything back; there is no partial
//! effect to clean up.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::discount::DiscountCodeRepository;
use crate::repository::folio;
use crate::repository::inventory::{InventoryLedger, MovementRequest};
use crate::repository::layaway::LayawayRepository;
use crate::repository::sale::SaleRepository;
use tienda_core::{
    promotion::{self, PromotionLine},
    validation, CoreError, Layaway, LayawayStatus, Money, MovementKind, PaymentMap, RateBps, Sale,
    SaleStatus, StockScope, ValidationError, Variant,
};

// =============================================================================
// Inputs & Receipts
// =============================================================================

/// One order line. Either references a variant (price defaults to the
/// catalog) or is free text (description and unit price required).
#[derive(Debug, Clone, Deserialize)]
pub struct SaleLine {
    pub variant_id: Option<String>,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateSale {
    /// Explicit store, used only when the actor has no home store.
    pub store_id: Option<String>,
    pub actor_id: String,
    pub actor_home_store: Option<String>,
    pub lines: Vec<SaleLine>,
    /// Payment-method label → cents. Empty for a preventa.
    pub payments: PaymentMap,
    /// `true` leaves the ticket `pendiente` for later settlement at caja.
    pub preventa: bool,
    pub discount_code: Option<String>,
    pub tax_rate_bps: Option<u32>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SaleReceipt {
    pub sale_id: String,
    pub folio: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone)]
pub struct CreateLayaway {
    pub store_id: Option<String>,
    pub actor_id: String,
    pub actor_home_store: Option<String>,
    pub lines: Vec<SaleLine>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LayawayReceipt {
    pub layaway_id: String,
    pub folio: String,
    pub total_cents: i64,
}

/// An order line after catalog resolution, with the snapshots the item
/// rows will carry and the scope data promotions match against.
#[derive(Debug, Clone)]
struct ResolvedLine {
    variant_id: Option<String>,
    sku_snapshot: Option<String>,
    description: String,
    quantity: i64,
    unit_price_cents: i64,
    subtotal_cents: i64,
    product_id: Option<String>,
    category_id: Option<String>,
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Debug, Clone)]
pub struct Coordinator {
    pool: SqlitePool,
}

impl Coordinator {
    pub fn new(pool: SqlitePool) -> Self {
        Coordinator { pool }
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    /// Creates a sale: resolves the store and lines, validates stock at
    /// both scopes, applies the discount code, writes the header + items,
    /// decrements both counters per line (`salida`, reason = folio) and
    /// burns the code use. One transaction end to end.
    pub async fn create_sale(&self, input: CreateSale) -> DbResult<SaleReceipt> {
        validation::validate_line_count(input.lines.len()).map_err(CoreError::Validation)?;
        if input.preventa {
            if !input.payments.is_empty() {
                return Err(CoreError::Validation(ValidationError::InvalidFormat {
                    field: "pagos".to_string(),
                    reason: "una preventa no lleva pagos; se cobra después".to_string(),
                })
                .into());
            }
        } else {
            validation::validate_payments(&input.payments).map_err(CoreError::Validation)?;
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let store_id = resolve_store(
            &mut tx,
            input.store_id.as_deref(),
            input.actor_home_store.as_deref(),
        )
        .await?;

        let lines = resolve_lines(&mut tx, &input.lines).await?;

        // Stock validation first, global pool before store scope: every
        // variant line must be coverable by both counters before anything
        // is written. The decrement below re-checks under the same
        // transaction anyway.
        for line in lines.iter().filter(|l| l.variant_id.is_some()) {
            check_stock(&mut tx, line, &store_id).await?;
        }

        let subtotal: Money = lines.iter().map(|l| Money::from_cents(l.subtotal_cents)).sum();

        let (discount, code_id) = match input.discount_code.as_deref() {
            Some(label) => {
                let code = DiscountCodeRepository::get_by_code_tx(&mut tx, label).await?;
                let usage = DiscountCodeRepository::usage_counts_tx(
                    &mut tx,
                    &code.id,
                    input.customer_phone.as_deref(),
                )
                .await?;
                let promo_lines: Vec<PromotionLine> = lines
                    .iter()
                    .map(|l| PromotionLine {
                        product_id: l.product_id.clone(),
                        category_id: l.category_id.clone(),
                        subtotal_cents: l.subtotal_cents,
                    })
                    .collect();
                let discount = promotion::validate_code(&code, subtotal, &promo_lines, usage, now)?;
                (discount, Some(code.id))
            }
            None => (Money::zero(), None),
        };

        let taxed_base = subtotal - discount;
        let tax = match input.tax_rate_bps {
            Some(bps) => RateBps::from_bps(bps).apply(taxed_base),
            None => Money::zero(),
        };
        let total = taxed_base + tax;

        let folio = folio::next_folio(&mut tx, "V").await?;
        let sale_id = Uuid::new_v4().to_string();
        let status = if input.preventa {
            SaleStatus::Pendiente
        } else {
            SaleStatus::Completada
        };
        let completed_at = (!input.preventa).then_some(now);
        let payments_json = encode_payments(&input.payments)?;

        sqlx::query(
            "INSERT INTO sales
                 (id, folio, store_id, actor_id, status, subtotal_cents, discount_cents,
                  tax_cents, total_cents, payments, customer_name, customer_phone,
                  discount_code_id, notes, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .bind(&sale_id)
        .bind(&folio)
        .bind(&store_id)
        .bind(&input.actor_id)
        .bind(status)
        .bind(subtotal.cents())
        .bind(discount.cents())
        .bind(tax.cents())
        .bind(total.cents())
        .bind(&payments_json)
        .bind(input.customer_name.as_deref())
        .bind(input.customer_phone.as_deref())
        .bind(code_id.as_deref())
        .bind(input.notes.as_deref())
        .bind(now)
        .bind(now)
        .bind(completed_at)
        .execute(&mut *tx)
        .await?;

        insert_item_rows(&mut tx, "sale_items", "sale_id", &sale_id, &lines).await?;

        // The decrement. One movement row per scope per variant line,
        // all carrying the folio as the reason.
        for line in lines.iter().filter(|l| l.variant_id.is_some()) {
            apply_line_movements(
                &mut tx,
                MovementKind::Salida,
                line,
                &store_id,
                &input.actor_id,
                &folio,
            )
            .await?;
        }

        if let Some(code_id) = code_id.as_deref() {
            DiscountCodeRepository::record_use_tx(
                &mut tx,
                code_id,
                &sale_id,
                input.customer_phone.as_deref(),
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %sale_id,
            folio = %folio,
            store_id = %store_id,
            status = status.as_str(),
            total_cents = total.cents(),
            "Sale created"
        );

        Ok(SaleReceipt {
            sale_id,
            folio,
            status,
            subtotal_cents: subtotal.cents(),
            discount_cents: discount.cents(),
            tax_cents: tax.cents(),
            total_cents: total.cents(),
        })
    }

    /// Cancels a sale and restores its stock, atomically. The sale stays
    /// on record with status `cancelada`; each variant line gets one
    /// `entrada` per scope referencing the folio.
    pub async fn cancel_sale(
        &self,
        sale_id: &str,
        actor_id: &str,
        reason: Option<&str>,
    ) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let sale = load_sale(&mut tx, sale_id).await?;
        if !sale.status.can_transition_to(SaleStatus::Cancelada) {
            return Err(CoreError::StateConflict {
                entity: "Venta",
                id: sale.folio.clone(),
                current: sale.status.as_str().to_string(),
                operation: "cancelar",
            }
            .into());
        }

        // Abono receipts stay tied to their layaway's paid-in total; undoing
        // one goes through the layaway, not through sale cancellation.
        let deposit: Option<String> =
            sqlx::query_scalar("SELECT layaway_id FROM layaway_deposits WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_optional(&mut *tx)
                .await?;
        if deposit.is_some() {
            return Err(CoreError::StateConflict {
                entity: "Venta",
                id: sale.folio.clone(),
                current: "abono de apartado".to_string(),
                operation: "cancelar",
            }
            .into());
        }

        let notes = match (sale.notes.as_deref(), reason) {
            (Some(notes), Some(reason)) => Some(format!("{notes}\nCancelada: {reason}")),
            (None, Some(reason)) => Some(format!("Cancelada: {reason}")),
            (notes, None) => notes.map(str::to_string),
        };

        sqlx::query("UPDATE sales SET status = ?2, notes = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(sale_id)
            .bind(SaleStatus::Cancelada)
            .bind(notes.as_deref())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let items = SaleRepository::get_items_tx(&mut tx, sale_id).await?;
        let restore_reason = format!("cancelación {}", sale.folio);
        for item in items.iter().filter(|i| i.variant_id.is_some()) {
            let line = ResolvedLine {
                variant_id: item.variant_id.clone(),
                sku_snapshot: item.sku_snapshot.clone(),
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal_cents,
                product_id: None,
                category_id: None,
            };
            apply_line_movements(
                &mut tx,
                MovementKind::Entrada,
                &line,
                &sale.store_id,
                actor_id,
                &restore_reason,
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(sale_id = %sale_id, folio = %sale.folio, "Sale cancelled, stock restored");

        let mut conn = self.pool.acquire().await?;
        SaleRepository::get_by_id_tx(&mut *conn, sale_id).await
    }

    /// Settles a preventa: `pendiente` → `completada`, recording the
    /// payment map. Inventory was already decremented at creation and is
    /// not touched again.
    pub async fn settle_sale(&self, sale_id: &str, payments: PaymentMap) -> DbResult<Sale> {
        validation::validate_payments(&payments).map_err(CoreError::Validation)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let sale = load_sale(&mut tx, sale_id).await?;
        if sale.status != SaleStatus::Pendiente {
            return Err(CoreError::StateConflict {
                entity: "Venta",
                id: sale.folio.clone(),
                current: sale.status.as_str().to_string(),
                operation: "cobrar",
            }
            .into());
        }

        sqlx::query(
            "UPDATE sales SET status = ?2, payments = ?3, completed_at = ?4, updated_at = ?4
             WHERE id = ?1",
        )
        .bind(sale_id)
        .bind(SaleStatus::Completada)
        .bind(encode_payments(&payments)?)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(sale_id = %sale_id, folio = %sale.folio, "Preventa settled");

        let mut conn = self.pool.acquire().await?;
        SaleRepository::get_by_id_tx(&mut *conn, sale_id).await
    }

    // -------------------------------------------------------------------------
    // Layaways
    // -------------------------------------------------------------------------

    /// Opens a layaway: the goods are reserved by decrementing both
    /// counters per line (`reserva` movements, reason = folio).
    pub async fn create_layaway(&self, input: CreateLayaway) -> DbResult<LayawayReceipt> {
        validation::validate_line_count(input.lines.len()).map_err(CoreError::Validation)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let store_id = resolve_store(
            &mut tx,
            input.store_id.as_deref(),
            input.actor_home_store.as_deref(),
        )
        .await?;

        let lines = resolve_lines(&mut tx, &input.lines).await?;
        for line in lines.iter().filter(|l| l.variant_id.is_some()) {
            check_stock(&mut tx, line, &store_id).await?;
        }

        let total: Money = lines.iter().map(|l| Money::from_cents(l.subtotal_cents)).sum();

        let folio = folio::next_folio(&mut tx, "A").await?;
        let layaway_id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO layaways
                 (id, folio, store_id, actor_id, status, customer_name, customer_phone,
                  total_cents, total_abonado_cents, notes, delivered_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, NULL, ?10, ?10)",
        )
        .bind(&layaway_id)
        .bind(&folio)
        .bind(&store_id)
        .bind(&input.actor_id)
        .bind(LayawayStatus::Activo)
        .bind(input.customer_name.as_deref())
        .bind(input.customer_phone.as_deref())
        .bind(total.cents())
        .bind(input.notes.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        insert_item_rows(&mut tx, "layaway_items", "layaway_id", &layaway_id, &lines).await?;

        for line in lines.iter().filter(|l| l.variant_id.is_some()) {
            apply_line_movements(
                &mut tx,
                MovementKind::Reserva,
                line,
                &store_id,
                &input.actor_id,
                &folio,
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            layaway_id = %layaway_id,
            folio = %folio,
            total_cents = total.cents(),
            "Layaway opened"
        );

        Ok(LayawayReceipt {
            layaway_id,
            folio,
            total_cents: total.cents(),
        })
    }

    /// Receipts a deposit (abono): creates a `completada` Sale for the
    /// money taken, links it from the deposit row and advances
    /// `total_abonado`. Reaching the full total auto-transitions
    /// `activo` → `pagado`.
    pub async fn add_deposit(
        &self,
        layaway_id: &str,
        amount_cents: i64,
        method: &str,
        actor_id: &str,
    ) -> DbResult<Layaway> {
        if amount_cents <= 0 {
            return Err(CoreError::Validation(ValidationError::MustBePositive {
                field: "monto".to_string(),
            })
            .into());
        }
        if method.trim().is_empty() {
            return Err(CoreError::Validation(ValidationError::Required {
                field: "metodo_pago".to_string(),
            })
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let layaway = load_layaway(&mut tx, layaway_id).await?;
        if layaway.status.is_terminal() {
            return Err(CoreError::StateConflict {
                entity: "Apartado",
                id: layaway.folio.clone(),
                current: layaway.status.as_str().to_string(),
                operation: "abonar",
            }
            .into());
        }

        let saldo = layaway.saldo_pendiente_cents();
        if amount_cents > saldo {
            return Err(CoreError::DepositExceedsBalance {
                folio: layaway.folio.clone(),
                saldo_cents: saldo,
                amount_cents,
            }
            .into());
        }

        // The money taken is a sale in its own right: folio'd, payment
        // recorded, no inventory effect (goods were reserved at opening).
        let sale_folio = folio::next_folio(&mut tx, "V").await?;
        let sale_id = Uuid::new_v4().to_string();
        let mut payments = PaymentMap::new();
        payments.insert(method.trim().to_string(), amount_cents);

        sqlx::query(
            "INSERT INTO sales
                 (id, folio, store_id, actor_id, status, subtotal_cents, discount_cents,
                  tax_cents, total_cents, payments, customer_name, customer_phone,
                  discount_code_id, notes, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?6, ?7, ?8, ?9, NULL, NULL, ?10, ?10, ?10)",
        )
        .bind(&sale_id)
        .bind(&sale_folio)
        .bind(&layaway.store_id)
        .bind(actor_id)
        .bind(SaleStatus::Completada)
        .bind(amount_cents)
        .bind(encode_payments(&payments)?)
        .bind(layaway.customer_name.as_deref())
        .bind(layaway.customer_phone.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO sale_items
                 (id, sale_id, variant_id, sku_snapshot, description, quantity,
                  unit_price_cents, subtotal_cents)
             VALUES (?1, ?2, NULL, NULL, ?3, 1, ?4, ?4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&sale_id)
        .bind(format!("Abono apartado {}", layaway.folio))
        .bind(amount_cents)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO layaway_deposits
                 (id, layaway_id, sale_id, amount_cents, method, actor_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(layaway_id)
        .bind(&sale_id)
        .bind(amount_cents)
        .bind(method.trim())
        .bind(actor_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let new_abonado = layaway.total_abonado_cents + amount_cents;
        let fully_paid = new_abonado == layaway.total_cents;
        let next_status = if fully_paid && layaway.status == LayawayStatus::Activo {
            LayawayStatus::Pagado
        } else {
            layaway.status
        };

        sqlx::query(
            "UPDATE layaways SET total_abonado_cents = ?2, status = ?3, updated_at = ?4
             WHERE id = ?1",
        )
        .bind(layaway_id)
        .bind(new_abonado)
        .bind(next_status)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            layaway_id = %layaway_id,
            folio = %layaway.folio,
            amount_cents,
            sale_folio = %sale_folio,
            fully_paid,
            "Deposit receipted"
        );

        let mut conn = self.pool.acquire().await?;
        LayawayRepository::get_by_id_tx(&mut *conn, layaway_id).await
    }

    /// Moves a layaway along its lifecycle. `entregado` stamps
    /// `delivered_at`; `cancelado` releases the reserved stock
    /// (`liberacion` per scope per line).
    pub async fn set_layaway_status(
        &self,
        layaway_id: &str,
        next: LayawayStatus,
        actor_id: &str,
    ) -> DbResult<Layaway> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let layaway = load_layaway(&mut tx, layaway_id).await?;
        if !layaway.status.can_transition_to(next) {
            return Err(CoreError::StateConflict {
                entity: "Apartado",
                id: layaway.folio.clone(),
                current: layaway.status.as_str().to_string(),
                operation: "cambiar estado",
            }
            .into());
        }
        if next == LayawayStatus::Pagado && layaway.saldo_pendiente_cents() > 0 {
            return Err(CoreError::StateConflict {
                entity: "Apartado",
                id: layaway.folio.clone(),
                current: "con saldo pendiente".to_string(),
                operation: "marcar pagado",
            }
            .into());
        }

        if next == LayawayStatus::Cancelado {
            let items = LayawayRepository::get_items_tx(&mut tx, layaway_id).await?;
            let reason = format!("cancelación {}", layaway.folio);
            for item in items.iter().filter(|i| i.variant_id.is_some()) {
                let line = ResolvedLine {
                    variant_id: item.variant_id.clone(),
                    sku_snapshot: item.sku_snapshot.clone(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    subtotal_cents: item.subtotal_cents,
                    product_id: None,
                    category_id: None,
                };
                apply_line_movements(
                    &mut tx,
                    MovementKind::Liberacion,
                    &line,
                    &layaway.store_id,
                    actor_id,
                    &reason,
                )
                .await?;
            }
        }

        let delivered_at = match next {
            LayawayStatus::Entregado => Some(now),
            _ => layaway.delivered_at,
        };

        sqlx::query(
            "UPDATE layaways SET status = ?2, delivered_at = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(layaway_id)
        .bind(next)
        .bind(delivered_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            layaway_id = %layaway_id,
            folio = %layaway.folio,
            from = layaway.status.as_str(),
            to = next.as_str(),
            "Layaway status changed"
        );

        let mut conn = self.pool.acquire().await?;
        LayawayRepository::get_by_id_tx(&mut *conn, layaway_id).await
    }

    /// Replaces a layaway's item set wholesale: releases the old
    /// reservations, re-reserves the new set and recomputes the total.
    /// Rejected once terminal, and the new total may not fall below what
    /// the customer has already paid.
    pub async fn replace_layaway_items(
        &self,
        layaway_id: &str,
        new_lines: Vec<SaleLine>,
        actor_id: &str,
    ) -> DbResult<Layaway> {
        validation::validate_line_count(new_lines.len()).map_err(CoreError::Validation)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let layaway = load_layaway(&mut tx, layaway_id).await?;
        // Once packed for pickup (or terminal) the item list is frozen.
        if layaway.status.is_terminal() || layaway.status == LayawayStatus::Listo {
            return Err(CoreError::StateConflict {
                entity: "Apartado",
                id: layaway.folio.clone(),
                current: layaway.status.as_str().to_string(),
                operation: "modificar artículos",
            }
            .into());
        }

        let edit_reason = format!("edición {}", layaway.folio);

        let old_items = LayawayRepository::get_items_tx(&mut tx, layaway_id).await?;
        for item in old_items.iter().filter(|i| i.variant_id.is_some()) {
            let line = ResolvedLine {
                variant_id: item.variant_id.clone(),
                sku_snapshot: item.sku_snapshot.clone(),
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal_cents,
                product_id: None,
                category_id: None,
            };
            apply_line_movements(
                &mut tx,
                MovementKind::Liberacion,
                &line,
                &layaway.store_id,
                actor_id,
                &edit_reason,
            )
            .await?;
        }
        sqlx::query("DELETE FROM layaway_items WHERE layaway_id = ?1")
            .bind(layaway_id)
            .execute(&mut *tx)
            .await?;

        let lines = resolve_lines(&mut tx, &new_lines).await?;
        let new_total: Money = lines.iter().map(|l| Money::from_cents(l.subtotal_cents)).sum();
        if new_total.cents() < layaway.total_abonado_cents {
            return Err(CoreError::Validation(ValidationError::OutOfRange {
                field: "total_cents".to_string(),
                min: layaway.total_abonado_cents,
                max: i64::MAX,
            })
            .into());
        }

        insert_item_rows(&mut tx, "layaway_items", "layaway_id", layaway_id, &lines).await?;
        for line in lines.iter().filter(|l| l.variant_id.is_some()) {
            apply_line_movements(
                &mut tx,
                MovementKind::Reserva,
                line,
                &layaway.store_id,
                actor_id,
                &edit_reason,
            )
            .await?;
        }

        // An edit that settles the balance promotes activo to pagado; one
        // that reopens it drops pagado back to activo.
        let next_status = match layaway.status {
            LayawayStatus::Activo if new_total.cents() == layaway.total_abonado_cents => {
                LayawayStatus::Pagado
            }
            LayawayStatus::Pagado if new_total.cents() > layaway.total_abonado_cents => {
                LayawayStatus::Activo
            }
            other => other,
        };

        sqlx::query(
            "UPDATE layaways SET total_cents = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(layaway_id)
        .bind(new_total.cents())
        .bind(next_status)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            layaway_id = %layaway_id,
            folio = %layaway.folio,
            new_total_cents = new_total.cents(),
            "Layaway items replaced"
        );

        let mut conn = self.pool.acquire().await?;
        LayawayRepository::get_by_id_tx(&mut *conn, layaway_id).await
    }
}

// =============================================================================
// Transaction-scoped helpers
// =============================================================================

fn encode_payments(payments: &PaymentMap) -> DbResult<String> {
    serde_json::to_string(payments)
        .map_err(|e| DbError::Internal(format!("serializing payments: {e}")))
}

async fn resolve_store(
    conn: &mut SqliteConnection,
    explicit: Option<&str>,
    actor_home: Option<&str>,
) -> DbResult<String> {
    let store_id = actor_home
        .or(explicit)
        .ok_or(CoreError::StoreRequired)?
        .to_string();
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM stores WHERE id = ?1")
        .bind(&store_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(CoreError::StoreNotFound(store_id).into());
    }
    Ok(store_id)
}

/// Resolves input lines against the catalog. Variant lines default their
/// description and unit price to the catalog snapshot; free-text lines
/// must carry both.
async fn resolve_lines(
    conn: &mut SqliteConnection,
    inputs: &[SaleLine],
) -> DbResult<Vec<ResolvedLine>> {
    let mut lines = Vec::with_capacity(inputs.len());
    for input in inputs {
        validation::validate_quantity(input.quantity).map_err(CoreError::Validation)?;

        let line = match input.variant_id.as_deref() {
            Some(variant_id) => {
                let variant = load_variant(conn, variant_id).await?;
                if !variant.is_active {
                    return Err(CoreError::Validation(ValidationError::InvalidFormat {
                        field: "variant_id".to_string(),
                        reason: format!("la variante {} está inactiva", variant.sku),
                    })
                    .into());
                }
                let unit_price = input.unit_price_cents.unwrap_or(variant.price_cents);
                validation::validate_price_cents(unit_price).map_err(CoreError::Validation)?;
                ResolvedLine {
                    variant_id: Some(variant.id.clone()),
                    sku_snapshot: Some(variant.sku.clone()),
                    description: input
                        .description
                        .clone()
                        .unwrap_or_else(|| variant.name.clone()),
                    quantity: input.quantity,
                    unit_price_cents: unit_price,
                    subtotal_cents: unit_price * input.quantity,
                    product_id: Some(variant.product_id),
                    category_id: variant.category_id,
                }
            }
            None => {
                let description = input
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| {
                        CoreError::Validation(ValidationError::Required {
                            field: "descripcion".to_string(),
                        })
                    })?
                    .to_string();
                let unit_price = input.unit_price_cents.ok_or_else(|| {
                    CoreError::Validation(ValidationError::Required {
                        field: "precio_unitario".to_string(),
                    })
                })?;
                validation::validate_price_cents(unit_price).map_err(CoreError::Validation)?;
                ResolvedLine {
                    variant_id: None,
                    sku_snapshot: None,
                    description,
                    quantity: input.quantity,
                    unit_price_cents: unit_price,
                    subtotal_cents: unit_price * input.quantity,
                    product_id: None,
                    category_id: None,
                }
            }
        };
        lines.push(line);
    }
    Ok(lines)
}

/// Pre-flight stock check for one line, surfacing the scope-specific
/// rejection before any write happens.
async fn check_stock(
    conn: &mut SqliteConnection,
    line: &ResolvedLine,
    store_id: &str,
) -> DbResult<()> {
    let variant_id = match line.variant_id.as_deref() {
        Some(id) => id,
        None => return Ok(()),
    };
    let sku = line.sku_snapshot.clone().unwrap_or_default();

    let snapshot = InventoryLedger::stock_snapshot_tx(conn, variant_id, Some(store_id)).await?;
    if snapshot.global < line.quantity {
        return Err(CoreError::InsufficientStock {
            sku,
            scope: StockScope::Global,
            requested: line.quantity,
            available: snapshot.global,
        }
        .into());
    }
    match snapshot.store {
        None => Err(CoreError::NotStockedInStore {
            sku,
            store_id: store_id.to_string(),
        }
        .into()),
        Some(store_qty) if store_qty < line.quantity => Err(CoreError::InsufficientStock {
            sku,
            scope: StockScope::Store,
            requested: line.quantity,
            available: store_qty,
        }
        .into()),
        Some(_) => Ok(()),
    }
}

/// Applies the same movement kind at both scopes for one variant line,
/// writing one movement row per scope.
async fn apply_line_movements(
    conn: &mut SqliteConnection,
    kind: MovementKind,
    line: &ResolvedLine,
    store_id: &str,
    actor_id: &str,
    reason: &str,
) -> DbResult<()> {
    let variant_id = match line.variant_id.as_deref() {
        Some(id) => id,
        None => return Ok(()),
    };
    for scope in [None, Some(store_id.to_string())] {
        InventoryLedger::apply_movement_tx(
            &mut *conn,
            &MovementRequest {
                kind,
                variant_id: variant_id.to_string(),
                store_id: scope,
                quantity: line.quantity,
                actor_id: actor_id.to_string(),
                reason: Some(reason.to_string()),
            },
        )
        .await?;
    }
    Ok(())
}

async fn insert_item_rows(
    conn: &mut SqliteConnection,
    table: &str,
    parent_column: &str,
    parent_id: &str,
    lines: &[ResolvedLine],
) -> DbResult<()> {
    let sql = format!(
        "INSERT INTO {table}
             (id, {parent_column}, variant_id, sku_snapshot, description, quantity,
              unit_price_cents, subtotal_cents)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
    );
    for line in lines {
        sqlx::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(parent_id)
            .bind(line.variant_id.as_deref())
            .bind(line.sku_snapshot.as_deref())
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.subtotal_cents)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn load_variant(conn: &mut SqliteConnection, variant_id: &str) -> DbResult<Variant> {
    sqlx::query_as::<_, Variant>(
        "SELECT id, product_id, category_id, sku, name, price_cents, is_active,
                created_at, updated_at
         FROM variants WHERE id = ?1",
    )
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()).into())
}

async fn load_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Sale> {
    match SaleRepository::get_by_id_tx(conn, sale_id).await {
        Err(DbError::NotFound { .. }) => {
            Err(CoreError::SaleNotFound(sale_id.to_string()).into())
        }
        other => other,
    }
}

async fn load_layaway(conn: &mut SqliteConnection, layaway_id: &str) -> DbResult<Layaway> {
    match LayawayRepository::get_by_id_tx(conn, layaway_id).await {
        Err(DbError::NotFound { .. }) => {
            Err(CoreError::LayawayNotFound(layaway_id.to_string()).into())
        }
        other => other,
    }
}
