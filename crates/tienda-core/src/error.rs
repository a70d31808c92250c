//! # Error Types
//!
//! Domain-specific error types for the commerce engine.
//!
//! ## Error Flow
//! ```text
//! ValidationError → CoreError → DbError (tienda-db) → ApiError (apps/api)
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derives, never manual impls
//! 2. Context lives in the error (SKU, folio, quantities), not in log lines
//! 3. Errors are enum variants, never bare strings
//! 4. A rejected operation leaves no partial effect; errors describe the
//!    rejection, not a repair procedure

use thiserror::Error;

/// Which inventory counter rejected a decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockScope {
    /// Cross-store pool.
    Global,
    /// A single store's allocation.
    Store,
}

impl StockScope {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockScope::Global => "global",
            StockScope::Store => "sucursal",
        }
    }
}

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Variante no encontrada: {0}")]
    VariantNotFound(String),

    #[error("Venta no encontrada: {0}")]
    SaleNotFound(String),

    #[error("Apartado no encontrado: {0}")]
    LayawayNotFound(String),

    #[error("Código de descuento no encontrado: {0}")]
    CodeNotFound(String),

    #[error("Sucursal no encontrada: {0}")]
    StoreNotFound(String),

    /// The actor has no home store and the request named none.
    #[error("Se requiere una sucursal: el usuario no tiene sucursal asignada")]
    StoreRequired,

    /// A counter decrement would go negative. Names the offending SKU,
    /// both quantities, and which ledger scope rejected it.
    #[error(
        "Stock insuficiente ({scope}) para {sku}: disponible {available}, solicitado {requested}",
        scope = .scope.as_str()
    )]
    InsufficientStock {
        sku: String,
        scope: StockScope,
        requested: i64,
        available: i64,
    },

    /// Distinct from insufficiency: the store has no ledger row for the
    /// variant at all.
    #[error("{sku} no está surtido en la sucursal {store_id}")]
    NotStockedInStore { sku: String, store_id: String },

    /// An operation was attempted against an entity whose current status
    /// forbids it (double cancel, editing a delivered layaway, ...).
    /// Handled and non-fatal: callers decide whether to resubmit.
    #[error("{entity} {id} está {current}; no se puede {operation}")]
    StateConflict {
        entity: &'static str,
        id: String,
        current: String,
        operation: &'static str,
    },

    // ========== Discount code rejections ==========
    #[error("El código {0} está desactivado")]
    CodeInactive(String),

    /// The code's active window excludes now (not yet valid or expired).
    #[error("El código {0} no está vigente")]
    CodeExpired(String),

    #[error("Compra mínima para {code}: {minimum_cents} centavos (subtotal {subtotal_cents})")]
    BelowMinimum {
        code: String,
        minimum_cents: i64,
        subtotal_cents: i64,
    },

    /// Scope is category/product and no line item falls under the
    /// code's reference set.
    #[error("El código {0} no aplica a ningún artículo de la orden")]
    ScopeMismatch(String),

    #[error("El código {0} agotó sus usos disponibles")]
    UsageExhausted(String),

    #[error("El cliente alcanzó el límite de usos del código {0}")]
    PerCustomerLimitReached(String),

    /// A deposit would push `total_abonado` past the layaway total.
    #[error("El abono de {amount_cents} excede el saldo pendiente de {saldo_cents} del apartado {folio}")]
    DepositExceedsBalance {
        folio: String,
        saldo_cents: i64,
        amount_cents: i64,
    },

    /// Input validation failure (wraps [`ValidationError`]).
    #[error("Entrada inválida: {0}")]
    Validation(#[from] ValidationError),
}

/// Input validation errors: malformed or missing request data, caught
/// before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} es requerido")]
    Required { field: String },

    #[error("{field} no debe exceder {max} caracteres")]
    TooLong { field: String, max: usize },

    #[error("{field} debe estar entre {min} y {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} debe ser positivo")]
    MustBePositive { field: String },

    #[error("{field} tiene formato inválido: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience alias for core results.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_names_sku_and_quantities() {
        let err = CoreError::InsufficientStock {
            sku: "CAM-AZUL-M".to_string(),
            scope: StockScope::Store,
            requested: 5,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "Stock insuficiente (sucursal) para CAM-AZUL-M: disponible 4, solicitado 5"
        );
    }

    #[test]
    fn state_conflict_message() {
        let err = CoreError::StateConflict {
            entity: "Venta",
            id: "V-000123".to_string(),
            current: "cancelada".to_string(),
            operation: "cancelar",
        };
        assert_eq!(err.to_string(), "Venta V-000123 está cancelada; no se puede cancelar");
    }

    #[test]
    fn validation_converts_to_core_error() {
        let v = ValidationError::Required { field: "items".to_string() };
        let core: CoreError = v.into();
        assert!(matches!(core, CoreError::Validation(_)));
    }
}
