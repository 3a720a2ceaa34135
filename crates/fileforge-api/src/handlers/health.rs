use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub status: &'static str,
    pub subscribers: usize,
}

pub async fn health_live(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(LiveStatus {
            status: "ok",
            subscribers: state.hub.subscriber_count(),
        }),
    )
}
