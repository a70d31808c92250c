//! Router assembly.

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::auth::{self, SharedAuthProvider};
use tienda_db::Database;

pub mod apartados;
pub mod comisiones;
pub mod inventario;
pub mod ventas;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: SharedAuthProvider,
}

impl AppState {
    pub fn new(db: Database, auth: impl crate::auth::AuthProvider + 'static) -> Self {
        AppState { db, auth: Arc::new(auth) }
    }
}

/// Builds the full router. Everything except `/health` sits behind the
/// bearer middleware.
pub fn build_router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/ventas", post(ventas::create).get(ventas::list))
        .route("/ventas/buscar-variantes", get(ventas::search_variants))
        .route("/ventas/{id}", get(ventas::detail))
        .route("/ventas/{id}/cancelar", put(ventas::cancel))
        .route("/ventas/{id}/cobrar", put(ventas::settle))
        .route("/apartados", post(apartados::create))
        .route("/apartados/{id}", get(apartados::detail))
        .route("/apartados/{id}/abono", post(apartados::deposit))
        .route("/apartados/{id}/estado", put(apartados::set_status))
        .route("/apartados/{id}/items", put(apartados::replace_items))
        .route("/inventario/movimiento", post(inventario::movement))
        .route("/inventario/transferencia", post(inventario::transfer))
        .route("/inventario/{variant_id}", get(inventario::snapshot))
        .route("/comisiones", get(comisiones::report))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(authed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness plus a database ping.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = state.db.health_check().await;
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
    }))
}
