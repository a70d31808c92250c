//! # Inventory Ledger
//!
//! Owns the two stock counters per (variant, optional store) pair and the
//! append-only movement log.
//!
//! ## The Two-Ledger Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  global_inventory          store_inventory                          │
//! │  (cross-store pool)        (per variant × store)                    │
//! │                                                                     │
//! │  CAM-AZUL-M: 10            CAM-AZUL-M @ centro:  4                  │
//! │                            CAM-AZUL-M @ norte:   3                  │
//! │                                                                     │
//! │  The two are INDEPENDENTLY mutable. Store stock is not forced to    │
//! │  stay ≤ global stock; that looseness is inherited and preserved.    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Contract
//! - `apply_movement` is the ONLY legal way to change a counter. It writes
//!   exactly one movement row with the counter update, atomically.
//! - No counter ever goes negative: a decrement past zero returns
//!   `InsufficientStock` and leaves the counter unchanged.
//! - Ledger rows are lazily created on first stock assignment.
//! - A snapshot read never authorizes a mutation: mutating paths re-read
//!   inside their own transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::{
    CoreError, MovementEffect, MovementKind, StockScope, StockSnapshot, ValidationError,
};

/// A requested counter change. `store_id = None` targets the global pool.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub kind: MovementKind,
    pub variant_id: String,
    pub store_id: Option<String>,
    pub quantity: i64,
    pub actor_id: String,
    pub reason: Option<String>,
}

/// Repository for the inventory ledger.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read-only snapshot of both counters. For display and validation
    /// only; never used alone to authorize a mutation.
    pub async fn stock_snapshot(
        &self,
        variant_id: &str,
        store_id: Option<&str>,
    ) -> DbResult<StockSnapshot> {
        let mut conn = self.pool.acquire().await?;
        Self::stock_snapshot_tx(&mut *conn, variant_id, store_id).await
    }

    /// Transaction-scoped snapshot, used by the coordinator so the
    /// validating read shares the mutating transaction.
    pub async fn stock_snapshot_tx(
        conn: &mut SqliteConnection,
        variant_id: &str,
        store_id: Option<&str>,
    ) -> DbResult<StockSnapshot> {
        let global: Option<i64> = sqlx::query_scalar(
            "SELECT quantity_available FROM global_inventory WHERE variant_id = ?1",
        )
        .bind(variant_id)
        .fetch_optional(&mut *conn)
        .await?;

        let store = match store_id {
            Some(store_id) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT quantity_available FROM store_inventory
                     WHERE variant_id = ?1 AND store_id = ?2",
                )
                .bind(variant_id)
                .bind(store_id)
                .fetch_optional(&mut *conn)
                .await?
            }
            None => None,
        };

        Ok(StockSnapshot { global: global.unwrap_or(0), store })
    }

    /// Movement history for a variant, newest first.
    pub async fn movements(
        &self,
        variant_id: &str,
        limit: u32,
    ) -> DbResult<Vec<tienda_core::InventoryMovement>> {
        let rows = sqlx::query_as::<_, tienda_core::InventoryMovement>(
            "SELECT id, variant_id, store_id, kind, quantity, actor_id, reason, created_at
             FROM inventory_movements
             WHERE variant_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )
        .bind(variant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Applies one movement as its own transaction.
    ///
    /// Returns the counter's new value.
    pub async fn apply_movement(&self, req: &MovementRequest) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let new_qty = Self::apply_movement_tx(&mut *tx, req).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(new_qty)
    }

    /// Applies one movement inside the caller's transaction: computes the
    /// new quantity per the kind's effect, rejects negatives, updates the
    /// counter and writes exactly one movement row.
    ///
    /// `transferencia` is rejected here; use [`InventoryLedger::transfer`],
    /// which owns the paired bookkeeping.
    pub async fn apply_movement_tx(
        conn: &mut SqliteConnection,
        req: &MovementRequest,
    ) -> DbResult<i64> {
        if req.kind == MovementKind::Transferencia {
            return Err(CoreError::Validation(ValidationError::InvalidFormat {
                field: "kind".to_string(),
                reason: "transferencia se registra vía transfer()".to_string(),
            })
            .into());
        }

        let negative_qty = req.quantity < 0;
        let zero_on_non_ajuste = req.quantity == 0 && req.kind != MovementKind::Ajuste;
        if negative_qty || zero_on_non_ajuste {
            return Err(CoreError::Validation(ValidationError::MustBePositive {
                field: "cantidad".to_string(),
            })
            .into());
        }

        let sku = variant_sku(conn, &req.variant_id).await?;
        let store_id = req.store_id.as_deref();

        let current = read_counter(conn, &req.variant_id, store_id).await?;

        // A subtraction against a store with no ledger row is a distinct
        // failure from plain insufficiency.
        let current = match (current, req.kind.effect(), store_id) {
            (Some(qty), _, _) => qty,
            (None, MovementEffect::Subtract, Some(store)) => {
                return Err(CoreError::NotStockedInStore {
                    sku,
                    store_id: store.to_string(),
                }
                .into());
            }
            (None, MovementEffect::Subtract, None) => {
                return Err(CoreError::InsufficientStock {
                    sku,
                    scope: StockScope::Global,
                    requested: req.quantity,
                    available: 0,
                }
                .into());
            }
            // Lazily create the row on first assignment.
            (None, MovementEffect::Add | MovementEffect::Set, _) => {
                create_counter_row(conn, &req.variant_id, store_id).await?;
                0
            }
        };

        let new_qty = match req.kind.effect() {
            MovementEffect::Add => current + req.quantity,
            MovementEffect::Subtract => {
                let remaining = current - req.quantity;
                if remaining < 0 {
                    return Err(CoreError::InsufficientStock {
                        sku,
                        scope: match store_id {
                            Some(_) => StockScope::Store,
                            None => StockScope::Global,
                        },
                        requested: req.quantity,
                        available: current,
                    }
                    .into());
                }
                remaining
            }
            MovementEffect::Set => req.quantity,
        };

        write_counter(conn, &req.variant_id, store_id, new_qty).await?;

        // For ajuste the logged quantity is the signed delta, so the
        // movement log always sums to the counter.
        let logged_qty = match req.kind.effect() {
            MovementEffect::Set => new_qty - current,
            _ => req.quantity,
        };
        insert_movement(conn, req, logged_qty).await?;

        debug!(
            variant_id = %req.variant_id,
            store_id = ?store_id,
            kind = req.kind.as_str(),
            new_qty,
            "Movement applied"
        );

        Ok(new_qty)
    }

    /// Moves stock between two stores as one transaction: salida-style at
    /// the origin, entrada-style at the destination, both logged as
    /// `transferencia` rows. The outbound leg carries `+quantity` and the
    /// inbound leg `-quantity`, so per-store signed sums keep matching the
    /// counters. The global counter is never touched.
    pub async fn transfer(
        &self,
        variant_id: &str,
        from_store: &str,
        to_store: &str,
        quantity: i64,
        actor_id: &str,
        reason: Option<&str>,
    ) -> DbResult<()> {
        if quantity <= 0 {
            return Err(CoreError::Validation(ValidationError::MustBePositive {
                field: "cantidad".to_string(),
            })
            .into());
        }
        if from_store == to_store {
            return Err(CoreError::Validation(ValidationError::InvalidFormat {
                field: "sucursal_destino".to_string(),
                reason: "la sucursal destino es igual al origen".to_string(),
            })
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let sku = variant_sku(&mut *tx, variant_id).await?;

        // Origin: subtract, guarded against going negative.
        let current = read_counter(&mut *tx, variant_id, Some(from_store))
            .await?
            .ok_or_else(|| CoreError::NotStockedInStore {
                sku: sku.clone(),
                store_id: from_store.to_string(),
            })?;
        let remaining = current - quantity;
        if remaining < 0 {
            return Err(CoreError::InsufficientStock {
                sku,
                scope: StockScope::Store,
                requested: quantity,
                available: current,
            }
            .into());
        }
        write_counter(&mut *tx, variant_id, Some(from_store), remaining).await?;

        // Destination: add, lazily creating the row.
        let dest = read_counter(&mut *tx, variant_id, Some(to_store)).await?;
        if dest.is_none() {
            create_counter_row(&mut *tx, variant_id, Some(to_store)).await?;
        }
        write_counter(&mut *tx, variant_id, Some(to_store), dest.unwrap_or(0) + quantity).await?;

        let note = reason.unwrap_or("");
        let out = MovementRequest {
            kind: MovementKind::Transferencia,
            variant_id: variant_id.to_string(),
            store_id: Some(from_store.to_string()),
            quantity,
            actor_id: actor_id.to_string(),
            reason: Some(format!("salida hacia {to_store} {note}").trim().to_string()),
        };
        insert_movement(&mut *tx, &out, quantity).await?;

        let inbound = MovementRequest {
            kind: MovementKind::Transferencia,
            variant_id: variant_id.to_string(),
            store_id: Some(to_store.to_string()),
            quantity,
            actor_id: actor_id.to_string(),
            reason: Some(format!("entrada desde {from_store} {note}").trim().to_string()),
        };
        insert_movement(&mut *tx, &inbound, -quantity).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(variant_id, from_store, to_store, quantity, "Transfer applied");
        Ok(())
    }
}

// =============================================================================
// Row helpers (shared by ledger + coordinator paths)
// =============================================================================

async fn variant_sku(conn: &mut SqliteConnection, variant_id: &str) -> DbResult<String> {
    sqlx::query_scalar::<_, String>("SELECT sku FROM variants WHERE id = ?1")
        .bind(variant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()).into())
}

async fn read_counter(
    conn: &mut SqliteConnection,
    variant_id: &str,
    store_id: Option<&str>,
) -> DbResult<Option<i64>> {
    let qty = match store_id {
        Some(store_id) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT quantity_available FROM store_inventory
                 WHERE variant_id = ?1 AND store_id = ?2",
            )
            .bind(variant_id)
            .bind(store_id)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>(
                "SELECT quantity_available FROM global_inventory WHERE variant_id = ?1",
            )
            .bind(variant_id)
            .fetch_optional(&mut *conn)
            .await?
        }
    };
    Ok(qty)
}

async fn create_counter_row(
    conn: &mut SqliteConnection,
    variant_id: &str,
    store_id: Option<&str>,
) -> DbResult<()> {
    let now = Utc::now();
    match store_id {
        Some(store_id) => {
            let store_exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM stores WHERE id = ?1")
                    .bind(store_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            if store_exists.is_none() {
                return Err(CoreError::StoreNotFound(store_id.to_string()).into());
            }
            sqlx::query(
                "INSERT INTO store_inventory (variant_id, store_id, quantity_available, updated_at)
                 VALUES (?1, ?2, 0, ?3)",
            )
            .bind(variant_id)
            .bind(store_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO global_inventory (variant_id, quantity_available, minimum_threshold, updated_at)
                 VALUES (?1, 0, 0, ?2)",
            )
            .bind(variant_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

async fn write_counter(
    conn: &mut SqliteConnection,
    variant_id: &str,
    store_id: Option<&str>,
    new_qty: i64,
) -> DbResult<()> {
    let now = Utc::now();
    let result = match store_id {
        Some(store_id) => {
            sqlx::query(
                "UPDATE store_inventory SET quantity_available = ?3, updated_at = ?4
                 WHERE variant_id = ?1 AND store_id = ?2",
            )
            .bind(variant_id)
            .bind(store_id)
            .bind(new_qty)
            .bind(now)
            .execute(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                "UPDATE global_inventory SET quantity_available = ?2, updated_at = ?3
                 WHERE variant_id = ?1",
            )
            .bind(variant_id)
            .bind(new_qty)
            .bind(now)
            .execute(&mut *conn)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Inventory row", variant_id));
    }
    Ok(())
}

async fn insert_movement(
    conn: &mut SqliteConnection,
    req: &MovementRequest,
    logged_qty: i64,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO inventory_movements (id, variant_id, store_id, kind, quantity, actor_id, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&req.variant_id)
    .bind(req.store_id.as_deref())
    .bind(req.kind)
    .bind(logged_qty)
    .bind(&req.actor_id)
    .bind(req.reason.as_deref())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
