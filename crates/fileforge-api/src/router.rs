use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use fileforge_common::types::Utility;
use fileforge_tools::{
    DocumentFetcher, FormatConverter, ImageResizer, PasswordGenerator, QrGenerator,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        self,
        tools::{Tool, run_single, submit_bulk},
    },
    state::AppState,
};

pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Upper bound on request bodies; base64 image batches are large.
    pub max_body_bytes: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Single, bulk and download routes under `/api/<name>`.
fn tool_routes<T: Tool>(router: Router<AppState>, utility: Utility) -> Router<AppState> {
    let name = utility.as_str();
    router
        .route(&format!("/{name}"), post(run_single::<T>))
        .route(&format!("/{name}/bulk"), post(submit_bulk::<T>))
        .route(
            &format!("/{name}/download/{{job_id}}"),
            get(handlers::jobs::download::<T>),
        )
}

pub fn api_router(state: AppState, settings: RouterSettings) -> Router {
    let mut api = Router::new();
    api = tool_routes::<PasswordGenerator>(api, Utility::Password);
    api = tool_routes::<QrGenerator>(api, Utility::Qr);
    api = tool_routes::<DocumentFetcher>(api, Utility::Fetch);
    api = tool_routes::<FormatConverter>(api, Utility::Convert);
    api = tool_routes::<ImageResizer>(api, Utility::Resize);
    let api = api.route("/jobs/{job_id}/last-event", get(handlers::jobs::last_event));

    Router::new()
        .nest("/api", api)
        .route("/ws", get(handlers::ws::progress_socket))
        .route("/health/live", get(handlers::health::health_live))
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
