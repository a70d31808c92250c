//! # tienda-core: Pure Business Logic for Tienda POS
//!
//! This crate is the heart of the transactional commerce engine. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Tienda POS Architecture                          │
//! │                                                                     │
//! │  HTTP request (apps/api)                                            │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Transaction Coordinator (tienda-db)                                │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌──────────────── tienda-core (THIS CRATE) ─────────────────────┐  │
//! │  │                                                               │  │
//! │  │  ┌─────────┐ ┌─────────┐ ┌────────────┐ ┌─────────────────┐  │  │
//! │  │  │  types  │ │  money  │ │ promotion  │ │   commission    │  │  │
//! │  │  │ Venta   │ │  Money  │ │ validate_  │ │    accrue       │  │  │
//! │  │  │ Apartado│ │ RateBps │ │   code     │ │                 │  │  │
//! │  │  └─────────┘ └─────────┘ └────────────┘ └─────────────────┘  │  │
//! │  │                                                               │  │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure functions**: same input = same output, always
//! 2. **Integer money**: all monetary values are cents (i64), rates are
//!    basis points - no floating point anywhere near a total
//! 3. **Closed lifecycles**: sale and layaway statuses are enums with
//!    explicit transition tables, never ad hoc strings
//! 4. **Explicit errors**: all failures are typed, never strings or panics

pub mod commission;
pub mod error;
pub mod money;
pub mod promotion;
pub mod types;
pub mod validation;

pub use commission::{CommissionSale, VendorSummary};
pub use error::{CoreError, CoreResult, StockScope, ValidationError};
pub use money::{Money, RateBps};
pub use promotion::{CodeUsage, PromotionLine};
pub use types::*;

/// Maximum line items allowed in a single sale or layaway.
///
/// Prevents runaway carts; a retail ticket never legitimately reaches this.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity on a single line.
///
/// Guards against fat-finger quantities (1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
