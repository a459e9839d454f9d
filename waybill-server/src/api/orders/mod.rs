//! Order API 模块

mod handler;

use axum::{
    Router,
    routing::{get, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/orders", get(handler::list))
        .route("/api/orders/{id}", get(handler::get_by_id))
        .route("/api/orders/{id}/edit", put(handler::edit))
        .route(
            "/api/orders/{id}/line-items/edit",
            put(handler::edit_line_items),
        )
        .route(
            "/api/orders/{id}/modification-status",
            get(handler::modification_status),
        )
}
