//! # Domain Types
//!
//! Core domain types for the transactional commerce engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │   Variant    │  │      Sale        │  │      Layaway         │  │
//! │  │  sku, price  │  │  folio, status   │  │  folio, status,      │  │
//! │  │              │  │  + SaleItem[]    │  │  total_abonado       │  │
//! │  └──────────────┘  └──────────────────┘  │  + items + abonos    │  │
//! │                                          └──────────────────────┘  │
//! │  ┌────────────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │ InventoryMovement  │  │ DiscountCode │  │  CommissionRule  │   │
//! │  │ append-only fact   │  │ kind + scope │  │  kind + scope    │   │
//! │  └────────────────────┘  └──────────────┘  └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity
//! Sales and layaways carry both an internal `id` (UUID v4, used for
//! relations) and a `folio` (human-readable sequential identifier printed
//! on the ticket). Movements reference the folio in their `reason`.
//!
//! ## Closed Lifecycles
//! Every status field is a closed enum with an explicit transition table.
//! The datastore stores the lowercase Spanish labels the business uses
//! (`pendiente`, `apartado` states, movement kinds), but no string ever
//! reaches the type system unchecked.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Payment-method map of a sale: label → amount in cents.
///
/// The label is recorded, never processed (payment gateways are out of
/// scope); a split tender simply has several entries.
pub type PaymentMap = BTreeMap<String, i64>;

// =============================================================================
// Variant
// =============================================================================

/// A sellable SKU. Belongs to one product; the category is denormalized
/// onto the variant so promotion/commission scope checks need no catalog
/// round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Variant {
    /// Unique identifier (UUID v4). Immutable.
    pub id: String,
    pub product_id: String,
    pub category_id: Option<String>,
    /// Business identifier, unique.
    pub sku: String,
    pub name: String,
    /// Price in cents.
    pub price_cents: i64,
    /// Soft-delete flag.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Inventory Ledger
// =============================================================================

/// The kind of an inventory movement.
///
/// `entrada`/`liberacion` add to a counter, `salida`/`reserva` subtract,
/// `transferencia` is the paired salida/entrada of a store transfer, and
/// `ajuste` sets the absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Entrada,
    Salida,
    Transferencia,
    Reserva,
    Liberacion,
    Ajuste,
}

/// How a movement kind changes a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementEffect {
    /// current + qty
    Add,
    /// current - qty (rejected if the result would be negative)
    Subtract,
    /// counter := qty
    Set,
}

impl MovementKind {
    /// Maps the kind to its counter effect.
    pub const fn effect(&self) -> MovementEffect {
        match self {
            MovementKind::Entrada | MovementKind::Liberacion => MovementEffect::Add,
            MovementKind::Salida | MovementKind::Reserva | MovementKind::Transferencia => {
                MovementEffect::Subtract
            }
            MovementKind::Ajuste => MovementEffect::Set,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entrada => "entrada",
            MovementKind::Salida => "salida",
            MovementKind::Transferencia => "transferencia",
            MovementKind::Reserva => "reserva",
            MovementKind::Liberacion => "liberacion",
            MovementKind::Ajuste => "ajuste",
        }
    }
}

/// Append-only movement fact. Never mutated or deleted; the sole audit
/// trail for every counter change. `store_id = None` means the movement
/// hit the cross-store global pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryMovement {
    pub id: String,
    pub variant_id: String,
    pub store_id: Option<String>,
    pub kind: MovementKind,
    pub quantity: i64,
    pub actor_id: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Cross-store pool counter for one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GlobalInventoryRecord {
    pub variant_id: String,
    pub quantity_available: i64,
    pub minimum_threshold: i64,
    pub updated_at: DateTime<Utc>,
}

/// Store-scoped counter for one variant × store.
///
/// Intentionally NOT constrained to be ≤ the global counter; the
/// two-ledger model keeps both independently mutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StoreInventoryRecord {
    pub variant_id: String,
    pub store_id: String,
    pub quantity_available: i64,
    pub updated_at: DateTime<Utc>,
}

/// Read-only snapshot of both counters, used for validation display only;
/// mutations re-read inside their own transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub global: i64,
    /// `None` when no store was asked for or the store has no ledger row.
    pub store: Option<i64>,
}

// =============================================================================
// Sale
// =============================================================================

/// The status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    /// Preventa ticket: reserved, unpaid cart awaiting cashier settlement.
    /// Inventory is already decremented.
    Pendiente,
    /// Paid and settled.
    Completada,
    /// Cancelled; inventory effect reversed by compensating movements.
    Cancelada,
}

impl SaleStatus {
    /// Transition table for the preventa → caja flow.
    ///
    /// ```text
    /// pendiente ──cobrar──► completada
    ///     │                     │
    ///     └────────cancelar─────┴──► cancelada (terminal)
    /// ```
    pub const fn can_transition_to(&self, next: SaleStatus) -> bool {
        matches!(
            (self, next),
            (SaleStatus::Pendiente, SaleStatus::Completada)
                | (SaleStatus::Pendiente, SaleStatus::Cancelada)
                | (SaleStatus::Completada, SaleStatus::Cancelada)
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pendiente => "pendiente",
            SaleStatus::Completada => "completada",
            SaleStatus::Cancelada => "cancelada",
        }
    }
}

/// Sale header. Items are owned [`SaleItem`] rows, immutable once the
/// status leaves `pendiente`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    /// Human-readable sequential identifier, e.g. `V-000042`.
    pub folio: String,
    pub store_id: String,
    pub actor_id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    /// Always `subtotal − discount + tax` at creation time.
    pub total_cents: i64,
    pub payments: PaymentMap,
    /// Customer snapshot, frozen at creation.
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub discount_code_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A sale line. Uses the snapshot pattern: description, SKU and unit price
/// are frozen at sale time so history survives catalog edits.
/// `variant_id = None` is a free-text line with no inventory effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub variant_id: Option<String>,
    pub sku_snapshot: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// quantity × unit price.
    pub subtotal_cents: i64,
}

// =============================================================================
// Layaway (Apartado)
// =============================================================================

/// The status of a layaway order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum LayawayStatus {
    /// Open, accepting deposits.
    Activo,
    /// Fully paid, pending preparation.
    Pagado,
    /// Ready for pickup.
    Listo,
    /// Delivered to the customer. Terminal; stamps `delivered_at`.
    Entregado,
    /// Cancelled. Terminal; reservations are released.
    Cancelado,
}

impl LayawayStatus {
    /// Transition table:
    ///
    /// ```text
    /// activo ──► pagado ──► listo ──► entregado (terminal)
    ///    │          │          │
    ///    └──────────┴──────────┴────► cancelado (terminal)
    /// ```
    pub const fn can_transition_to(&self, next: LayawayStatus) -> bool {
        matches!(
            (self, next),
            (LayawayStatus::Activo, LayawayStatus::Pagado)
                | (LayawayStatus::Activo, LayawayStatus::Cancelado)
                | (LayawayStatus::Pagado, LayawayStatus::Listo)
                | (LayawayStatus::Pagado, LayawayStatus::Cancelado)
                | (LayawayStatus::Listo, LayawayStatus::Entregado)
                | (LayawayStatus::Listo, LayawayStatus::Cancelado)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, LayawayStatus::Entregado | LayawayStatus::Cancelado)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            LayawayStatus::Activo => "activo",
            LayawayStatus::Pagado => "pagado",
            LayawayStatus::Listo => "listo",
            LayawayStatus::Entregado => "entregado",
            LayawayStatus::Cancelado => "cancelado",
        }
    }
}

/// Layaway header. `saldo_pendiente` is derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Layaway {
    pub id: String,
    /// e.g. `A-000007`.
    pub folio: String,
    pub store_id: String,
    pub actor_id: String,
    pub status: LayawayStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub total_cents: i64,
    /// Sum of receipted deposits. Monotonic; never exceeds `total_cents`.
    pub total_abonado_cents: i64,
    pub notes: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Layaway {
    /// Outstanding balance, recomputed on every read.
    #[inline]
    pub fn saldo_pendiente_cents(&self) -> i64 {
        self.total_cents - self.total_abonado_cents
    }
}

/// A layaway line (same snapshot pattern as [`SaleItem`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LayawayItem {
    pub id: String,
    pub layaway_id: String,
    pub variant_id: Option<String>,
    pub sku_snapshot: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// A deposit (abono) receipted against a layaway. Links to the Sale
/// record the coordinator created when the money was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LayawayDeposit {
    pub id: String,
    pub layaway_id: String,
    pub sale_id: Option<String>,
    pub amount_cents: i64,
    /// Payment-method label, recorded as-is.
    pub method: String,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discount Codes
// =============================================================================

/// Whether a rate-bearing rule is a percentage or a flat amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    /// `value` is basis points (1000 = 10%).
    Percentage,
    /// `value` is cents.
    Fixed,
}

/// What a discount code applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum DiscountScope {
    All,
    Category,
    Product,
}

/// A discount code definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: String,
    pub code: String,
    pub kind: RateKind,
    /// Basis points for `percentage`, cents for `fixed`.
    pub value: i64,
    /// Minimum order subtotal for the code to apply.
    pub min_purchase_cents: Option<i64>,
    /// Cap on the computed discount (percentage codes only).
    pub max_discount_cents: Option<i64>,
    /// Global usage cap.
    pub max_uses: Option<i64>,
    /// Per-customer usage cap (keyed by the customer phone snapshot).
    pub max_uses_per_customer: Option<i64>,
    pub scope: DiscountScope,
    /// Category or product ids the scope refers to.
    pub reference_ids: Vec<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Global usage counter, incremented by the coordinator on commit.
    pub times_used: i64,
}

// =============================================================================
// Commission Rules
// =============================================================================

/// What a commission rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CommissionScope {
    All,
    Employee,
    Category,
    Product,
}

/// A commission rule. Multiple matching rules on one sale all accrue -
/// there is deliberately no mutual exclusion between rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CommissionRule {
    pub id: String,
    pub name: String,
    pub kind: RateKind,
    /// Basis points for `percentage`, cents for `fixed`.
    pub value: i64,
    pub scope: CommissionScope,
    /// Employee, category or product id, per `scope`.
    pub reference_id: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
