//! Tour API 模块

mod handler;

use axum::{
    Router,
    routing::{get, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/tours", get(handler::list))
        .route("/api/tours/{id}/edit", put(handler::edit))
        .route(
            "/api/tours/{id}/modification-status",
            get(handler::modification_status),
        )
}
