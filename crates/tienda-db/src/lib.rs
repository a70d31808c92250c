//! # tienda-db: Persistence + Transaction Coordinator
//!
//! SQLite persistence for the Tienda POS commerce engine, and the
//! transaction coordinator that drives every multi-step unit of work.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Data Flow                                    │
//! │                                                                     │
//! │  HTTP handler (apps/api)                                            │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌──────────────────── tienda-db (THIS CRATE) ──────────────────┐   │
//! │  │                                                              │   │
//! │  │  Coordinator ──── one sqlx transaction per unit of work ───┐ │   │
//! │  │      │                                                     │ │   │
//! │  │      ├── InventoryLedger (the ONLY counter mutator)        │ │   │
//! │  │      ├── folio counters                                    │ │   │
//! │  │      ├── sale / layaway / discount writes                  │ │   │
//! │  │      └── tienda-core promotion + lifecycle checks          │ │   │
//! │  │                                                     COMMIT ┘ │   │
//! │  │  Repositories: read paths (lists, detail, search)            │   │
//! │  └──────────────────────────────────────────────────────────────┘   │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite (WAL)                                                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The validating read and the mutating write of a unit of work always
//! share one transaction; read-then-write across two calls is not offered
//! by this API, which is what closes the lost-update race on concurrent
//! sales of the same SKU.

pub mod coordinator;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use coordinator::{
    Coordinator, CreateLayaway, CreateSale, LayawayReceipt, SaleLine, SaleReceipt,
};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::commission::CommissionRuleRepository;
pub use repository::discount::DiscountCodeRepository;
pub use repository::inventory::{InventoryLedger, MovementRequest};
pub use repository::layaway::LayawayRepository;
pub use repository::sale::{SaleFilters, SaleRepository};
pub use repository::variant::{SellableVariant, VariantRepository};
