//! Route definitions for the retail inventory ledger

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/products", product_routes())
        .nest("/warehouses", warehouse_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/categories", category_routes())
        .route("/inventory", get(handlers::list_stock))
        .nest("/purchases", purchase_routes())
        .nest("/sales", sale_routes())
        .nest("/transfers", transfer_routes())
        .nest("/inventory-audits", audit_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/:id", get(handlers::get_product))
}

fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_warehouses).post(handlers::create_warehouse))
        .route(
            "/:id",
            get(handlers::get_warehouse).delete(handlers::delete_warehouse),
        )
}

fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route(
            "/:id",
            get(handlers::get_supplier).delete(handlers::delete_supplier),
        )
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_categories).post(handlers::create_category))
        .route(
            "/:id",
            get(handlers::get_category).delete(handlers::delete_category),
        )
}

/// Purchase order routes
fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_purchases).post(handlers::create_purchase))
        .route("/confirm", post(handlers::confirm_purchase))
        .route(
            "/:id",
            get(handlers::get_purchase)
                .put(handlers::update_purchase)
                .delete(handlers::delete_purchase),
        )
        .route("/:id/receipt", put(handlers::record_receipt))
}

fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/confirm", post(handlers::confirm_sale))
        .route(
            "/:id",
            get(handlers::get_sale)
                .put(handlers::update_sale)
                .delete(handlers::delete_sale),
        )
}

fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers).post(handlers::create_transfer))
        .route("/confirm", post(handlers::confirm_transfer))
        .route(
            "/:id",
            get(handlers::get_transfer)
                .put(handlers::update_transfer)
                .delete(handlers::delete_transfer),
        )
}

fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_audits).post(handlers::create_audit))
        .route("/confirm", post(handlers::confirm_audit))
        .route(
            "/:id",
            get(handlers::get_audit).delete(handlers::delete_audit),
        )
        .route("/:id/counts", put(handlers::record_counts))
}
